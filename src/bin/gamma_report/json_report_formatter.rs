use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use gamma_agreement::Report;

pub fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    let mut file = File::create(path)
        .map_err(|err| format!("Failed to create report file '{}': {err}", path.display()))?;
    write_report_to(&mut file, report)
        .map_err(|err| format!("Failed to write report '{}': {err}", path.display()))
}

pub fn write_report_to<W: Write>(writer: &mut W, report: &Report) -> Result<(), String> {
    serde_json::to_writer_pretty(&mut *writer, report)
        .map_err(|err| format!("Failed to serialize report JSON: {err}"))?;
    writer
        .write_all(b"\n")
        .map_err(|err| format!("Failed to finalize report output: {err}"))
}
