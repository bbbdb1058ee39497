use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GammaError;

/// Half-open time interval `[start, end)` with a strictly positive duration.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Segment {
    start: f64,
    end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Result<Self, GammaError> {
        if !start.is_finite() || !end.is_finite() || end - start <= 0.0 {
            return Err(GammaError::InvalidSegment { start, end });
        }
        // Adding +0.0 folds -0.0 into 0.0 so ordering and equality agree.
        Ok(Self {
            start: start + 0.0,
            end: end + 0.0,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Moves both bounds by `offset`; the duration is unchanged.
    pub fn shifted(&self, offset: f64) -> Result<Self, GammaError> {
        Self::new(self.start + offset, self.end + offset)
    }
}

// Bounds are finite and never -0.0, so total_cmp agrees with numeric order.
impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Segment {}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then_with(|| self.end.total_cmp(&other.end))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3} --> {:.3}]", self.start, self.end)
    }
}

/// One labeled segment produced by one annotator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Unit {
    pub segment: Segment,
    pub label: Option<String>,
}

impl Unit {
    pub fn new(segment: Segment, label: Option<String>) -> Self {
        Self { segment, label }
    }
}

/// How the chance sampler draws its pivot offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotType {
    #[default]
    Float,
    Int,
}

impl PivotType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
        }
    }
}

/// Which null model produces the chance continua.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    #[default]
    Pivot,
    Statistical,
}
