//! Delimited text form of a continuum: one `annotator,label,start,end`
//! record per line. An optional header line whose first field is
//! `annotator` is skipped, as are blank lines and lines starting with `#`.
//!
//! Unquoted fields are trimmed and an unquoted empty label stands for an
//! unlabeled unit. A field wrapped in double quotes is taken verbatim, with
//! `""` standing for one quote, so `""` is the empty label. The writer quotes
//! exactly the fields that would otherwise read back differently.

use std::borrow::Cow;
use std::io::{BufRead, Write};

use crate::continuum::Continuum;
use crate::error::GammaError;

const HEADER: &str = "annotator,label,start,end";

#[derive(Debug, PartialEq)]
struct Field {
    text: String,
    quoted: bool,
}

pub fn read_delimited<R: BufRead>(reader: R) -> Result<Continuum, GammaError> {
    let mut continuum = Continuum::new();
    let mut seen_record = false;
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| GammaError::io("read delimited continuum", e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields = split_record(&line, line_no)?;
        let first_record = !seen_record;
        seen_record = true;
        if first_record && !fields[0].quoted && fields[0].text.eq_ignore_ascii_case("annotator") {
            continue;
        }
        if fields.len() != 4 {
            return Err(GammaError::parse(
                line_no,
                format!("expected 4 fields, found {}", fields.len()),
            ));
        }
        let annotator = &fields[0];
        if annotator.text.is_empty() && !annotator.quoted {
            return Err(GammaError::parse(line_no, "empty annotator name"));
        }
        let start = parse_time(&fields[2].text, line_no)?;
        let end = parse_time(&fields[3].text, line_no)?;
        let label = &fields[1];
        let label = (label.quoted || !label.text.is_empty()).then(|| label.text.clone());
        continuum
            .add(&annotator.text, start, end, label)
            .map_err(|e| GammaError::parse(line_no, e.to_string()))?;
    }
    tracing::debug!(
        annotators = continuum.num_annotators(),
        units = continuum.num_units(),
        "io: delimited continuum read"
    );
    Ok(continuum)
}

fn split_record(line: &str, line_no: usize) -> Result<Vec<Field>, GammaError> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let field = if chars.next_if_eq(&'"').is_some() {
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('"') if chars.next_if_eq(&'"').is_some() => text.push('"'),
                    Some('"') => break,
                    Some(c) => text.push(c),
                    None => return Err(GammaError::parse(line_no, "unterminated quoted field")),
                }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            Field { text, quoted: true }
        } else {
            let mut text = String::new();
            while let Some(c) = chars.next_if(|&c| c != ',') {
                text.push(c);
            }
            Field {
                text: text.trim_end().to_string(),
                quoted: false,
            }
        };
        fields.push(field);
        match chars.next() {
            None => return Ok(fields),
            Some(',') => {}
            Some(c) => {
                return Err(GammaError::parse(
                    line_no,
                    format!("unexpected '{c}' after quoted field"),
                ))
            }
        }
    }
}

fn parse_time(field: &str, line_no: usize) -> Result<f64, GammaError> {
    field
        .parse::<f64>()
        .map_err(|e| GammaError::parse(line_no, format!("invalid time '{field}': {e}")))
}

/// Quotes `text` when reading it back unquoted would change it.
fn escape_field(text: &str) -> Result<Cow<'_, str>, GammaError> {
    if text.contains(['\n', '\r']) {
        return Err(GammaError::invalid_input(format!(
            "{text:?} contains a line break and cannot be written as a delimited field"
        )));
    }
    let needs_quotes = text.is_empty()
        || text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.starts_with('#')
        || text.contains([',', '"']);
    Ok(if needs_quotes {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    })
}

/// Writes a header followed by every unit, annotator-major.
///
/// Fails with [`GammaError::InvalidInput`] if an annotator name or label
/// contains a line break.
pub fn write_delimited<W: Write>(continuum: &Continuum, mut writer: W) -> Result<(), GammaError> {
    let io_err = |e: std::io::Error| GammaError::io("write delimited continuum", e);
    writeln!(writer, "{HEADER}").map_err(io_err)?;
    for (annotator, unit) in continuum.iter_units() {
        let label = match unit.label.as_deref() {
            Some(label) => escape_field(label)?,
            None => Cow::Borrowed(""),
        };
        writeln!(
            writer,
            "{},{},{},{}",
            escape_field(annotator)?,
            label,
            unit.segment.start(),
            unit.segment.end()
        )
        .map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}
