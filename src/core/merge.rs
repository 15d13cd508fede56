use crate::domain::model::{MergedTable, ServiceReport, DOCUMENT_COLUMN};
use crate::utils::error::Result;
use std::collections::HashMap;

/// Left-joins every service report onto the input document list.
///
/// The base table has one row per input document, in input order. Each
/// report contributes its columns renamed `<service>_<column>`. A document
/// with several findings in one service multiplies its rows; a document
/// the service has no row for is padded with empty strings.
pub fn merge_reports(documents: &[String], reports: &[ServiceReport]) -> MergedTable {
    let mut columns = vec![DOCUMENT_COLUMN.to_string()];
    let mut rows: Vec<Vec<String>> = documents.iter().map(|d| vec![d.clone()]).collect();

    for report in reports {
        for column in &report.columns {
            columns.push(format!("{}_{}", report.service, column));
        }

        let mut by_document: HashMap<&str, Vec<&Vec<String>>> = HashMap::new();
        for row in &report.rows {
            by_document
                .entry(row.document.as_str())
                .or_default()
                .push(&row.values);
        }

        let width = report.columns.len();
        let mut next_rows = Vec::with_capacity(rows.len());
        for row in rows {
            match by_document.get(row[0].as_str()) {
                Some(matches) => {
                    for values in matches {
                        let mut expanded = row.clone();
                        expanded.extend(values.iter().cloned());
                        next_rows.push(expanded);
                    }
                }
                None => {
                    let mut padded = row;
                    padded.extend(std::iter::repeat(String::new()).take(width));
                    next_rows.push(padded);
                }
            }
        }
        rows = next_rows;
    }

    MergedTable { columns, rows }
}

/// Renders the table as UTF-8 CSV, header first. Fields are quoted as
/// needed, so free-text values with commas stay intact.
pub fn to_csv_bytes(table: &MergedTable) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::utils::error::ScreeningError::ProcessingError {
            message: format!("CSV buffer flush failed: {}", e),
        })
}

/// Renders the table as an array of objects, one per row, keyed by column
/// name.
pub fn to_json_records(table: &MergedTable) -> serde_json::Value {
    let records: Vec<serde_json::Value> = table
        .rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (column, value) in table.columns.iter().zip(row.iter()) {
                object.insert(column.clone(), serde_json::Value::String(value.clone()));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(records)
}
