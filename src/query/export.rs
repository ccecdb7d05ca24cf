//! CSV export of stored results.
//!
//! Renders the full retained row set of a completed execution to a CSV file
//! named deterministically from the execution id.

use crate::error::ExportError;
use crate::query::registry::QueryResults;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Location of a written CSV artifact.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExport {
    pub file_path: PathBuf,
    pub file_name: String,
}

/// Writes the results to `<dir>/query_results_<id>.csv`.
///
/// The header row carries column names in column order; one data line is
/// written per retained row, up to `max_rows`. The directory is created if
/// absent.
pub fn write_csv(
    dir: &Path,
    id: Uuid,
    results: &QueryResults,
    max_rows: usize,
) -> Result<CsvExport, ExportError> {
    fs::create_dir_all(dir)
        .map_err(|e| ExportError::Io(format!("cannot create {}: {e}", dir.display())))?;

    let file_name = format!("query_results_{id}.csv");
    let file_path = dir.join(&file_name);

    let mut output = String::new();

    let header: Vec<String> = results
        .columns
        .iter()
        .map(|col| csv_quote(&col.name))
        .collect();
    output.push_str(&header.join(","));
    output.push('\n');

    for row in results.rows.iter().take(max_rows) {
        let fields: Vec<String> = row
            .iter()
            .map(|value| csv_quote(&value.to_csv_field()))
            .collect();
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    fs::write(&file_path, output)
        .map_err(|e| ExportError::Io(format!("cannot write {}: {e}", file_path.display())))?;

    Ok(CsvExport {
        file_path,
        file_name,
    })
}

/// Quote a CSV field per RFC 4180: enclose in double quotes if it contains
/// comma, double quote, or newline. Double quotes inside are escaped by
/// doubling.
fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        let escaped = s.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        s.to_string()
    }
}
