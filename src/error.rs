use thiserror::Error;

#[derive(Debug, Error)]
pub enum GammaError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid segment [{start}, {end}]: duration must be positive and bounds finite")]
    InvalidSegment { start: f64, end: f64 },
    #[error("no feasible alignment: {message}")]
    Infeasible { message: String },
    #[error("degenerate input: {message}")]
    Degenerate { message: String },
    #[error("alignment computed for continuum generation {expected}, continuum is now at {actual}")]
    StaleAlignment { expected: u64, actual: u64 },
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl GammaError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn infeasible(message: impl Into<String>) -> Self {
        Self::Infeasible {
            message: message.into(),
        }
    }

    pub(crate) fn degenerate(message: impl Into<String>) -> Self {
        Self::Degenerate {
            message: message.into(),
        }
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
