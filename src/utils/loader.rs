use crate::utils::error::{Result, ScreeningError};
use crate::utils::validation;
use std::path::Path;

pub const ALLOWED_INPUT_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// Loads the document-number column from the input file.
///
/// CSV and TSV files must contain exactly one column; the first row is a
/// header and is skipped. TXT files are one document per line with no
/// header. Values are kept verbatim as strings so leading zeros survive;
/// blank cells are dropped and duplicates are kept, in file order.
pub fn load_documents<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().to_string();

    validation::validate_file_extensions("input", &[path_str.clone()], ALLOWED_INPUT_EXTENSIONS)?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let delimiter = if extension == "tsv" { b'\t' } else { b',' };
    let has_headers = extension != "txt";

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .from_path(path)
        .map_err(|e| ScreeningError::InputError {
            message: format!("cannot open '{}': {}", path_str, e),
        })?;

    if has_headers {
        let headers = reader.headers()?.clone();
        if headers.len() != 1 {
            return Err(ScreeningError::InputError {
                message: format!(
                    "'{}' must have exactly one column, found {}",
                    path_str,
                    headers.len()
                ),
            });
        }
    }

    let mut documents = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != 1 {
            return Err(ScreeningError::InputError {
                message: format!("'{}' must have exactly one column", path_str),
            });
        }
        let value = record[0].trim();
        if !value.is_empty() {
            documents.push(value.to_string());
        }
    }

    if documents.is_empty() {
        return Err(ScreeningError::InputError {
            message: format!("'{}' contains no document numbers", path_str),
        });
    }

    Ok(documents)
}
