use crate::config::toml_config::ServiceDefinition;
use crate::domain::model::ServiceReport;
use crate::domain::ports::Screener;
use crate::utils::error::{Result, ScreeningError};
use crate::utils::progress::ProgressTracker;
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

const DEFAULT_DELIMITER: u8 = b';';

pub const NO_MATCH_MARKER: &str = "Sin coincidencias";

const OUTPUT_COLUMNS: &[&str] = &[
    "Iden_number_UE",
    "Nombre_UE",
    "Tipo_UE",
    "Comentarios_UE",
    "ref_num_UE",
    "Iden_programme_UE",
];

/// Header the search runs against. The export pads identification numbers
/// with leading zeros, so both sides are matched zero-insensitively.
const IDEN_NUMBER: &str = "Iden_number";

const OPTIONAL_SOURCE_COLUMNS: &[&str] = &[
    "Naal_wholename",
    "Subject_type",
    "Entity_remark",
    "EU_ref_num",
    "Iden_programme",
];

/// EU consolidated sanctions list screening against a local export.
/// Input documents are matched against the identification numbers column,
/// ignoring leading zeros on either side.
#[derive(Debug)]
pub struct ListaEuScreener {
    name: String,
    records: Vec<EuRecord>,
}

#[derive(Debug, Clone)]
struct EuRecord {
    iden_number: String,
    wholename: String,
    subject_type: String,
    remark: String,
    ref_num: String,
    programme: String,
}

impl ListaEuScreener {
    pub fn from_definition(definition: &ServiceDefinition) -> Result<Self> {
        let dataset = definition.dataset.as_deref().ok_or_else(|| {
            ScreeningError::MissingConfigError {
                field: format!("services.{}.dataset", definition.name),
            }
        })?;
        let delimiter = definition
            .delimiter
            .as_deref()
            .and_then(|d| d.bytes().next())
            .unwrap_or(DEFAULT_DELIMITER);
        Self::from_file(&definition.name, dataset, delimiter)
    }

    pub fn from_file<P: AsRef<Path>>(name: &str, path: P, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| ScreeningError::DatasetError {
                message: format!(
                    "Cannot open EU list dataset {}: {}",
                    path.as_ref().display(),
                    e
                ),
            })?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let iden_index = column(IDEN_NUMBER).ok_or_else(|| ScreeningError::DatasetError {
            message: format!(
                "EU list dataset {} is missing the essential '{}' column",
                path.as_ref().display(),
                IDEN_NUMBER
            ),
        })?;
        let wholename_index = column(OPTIONAL_SOURCE_COLUMNS[0]);
        let subject_index = column(OPTIONAL_SOURCE_COLUMNS[1]);
        let remark_index = column(OPTIONAL_SOURCE_COLUMNS[2]);
        let ref_num_index = column(OPTIONAL_SOURCE_COLUMNS[3]);
        let programme_index = column(OPTIONAL_SOURCE_COLUMNS[4]);

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            records.push(EuRecord {
                iden_number: field(&record, Some(iden_index)),
                wholename: field(&record, wholename_index),
                subject_type: field(&record, subject_index),
                remark: field(&record, remark_index),
                ref_num: field(&record, ref_num_index),
                programme: field(&record, programme_index),
            });
        }

        tracing::debug!(
            "📁 Loaded {} EU list records from {}",
            records.len(),
            path.as_ref().display()
        );

        Ok(Self {
            name: name.to_string(),
            records,
        })
    }
}

fn field(record: &csv::StringRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Leading zeros carry no meaning in the EU identifiers.
fn normalize(document: &str) -> &str {
    document.trim_start_matches('0').trim()
}

/// `\b0*<doc>(?:\D|$)` tolerates zero-padding in the list and stops the
/// match from continuing into a longer number.
fn zero_insensitive_pattern(term: &str) -> Result<Regex> {
    let pattern = format!(r"\b0*{}(?:\D|$)", regex::escape(term));
    Regex::new(&pattern).map_err(|e| ScreeningError::ProcessingError {
        message: format!("Cannot build EU search pattern for '{}': {}", term, e),
    })
}

fn combined_pattern(unique: &BTreeSet<&str>) -> Result<Regex> {
    let escaped: Vec<String> = unique.iter().map(|d| regex::escape(d)).collect();
    let pattern = format!(r"\b0*(?:{})(?:\D|$)", escaped.join("|"));
    Regex::new(&pattern).map_err(|e| ScreeningError::ProcessingError {
        message: format!("Cannot build EU search pattern: {}", e),
    })
}

#[async_trait]
impl Screener for ListaEuScreener {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<String> {
        OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn run(
        &self,
        documents: &[String],
        progress: &ProgressTracker,
    ) -> Result<ServiceReport> {
        let mut report = ServiceReport::new(self.name.clone(), self.columns());
        if documents.is_empty() {
            return Ok(report);
        }

        let unique: BTreeSet<&str> = documents
            .iter()
            .map(|d| normalize(d))
            .filter(|d| !d.is_empty())
            .collect();

        if unique.is_empty() {
            for document in documents {
                report.push_uniform(document.clone(), NO_MATCH_MARKER);
                progress.record_done();
            }
            return Ok(report);
        }

        let prefilter = combined_pattern(&unique)?;
        let candidates: Vec<&EuRecord> = self
            .records
            .iter()
            .filter(|record| prefilter.is_match(&record.iden_number))
            .collect();

        let mut patterns: HashMap<&str, Regex> = HashMap::new();
        for term in &unique {
            patterns.insert(term, zero_insensitive_pattern(term)?);
        }

        for document in documents {
            let normalized = normalize(document);
            let mut found = false;

            if let Some(pattern) = patterns.get(normalized) {
                for record in &candidates {
                    if pattern.is_match(&record.iden_number) {
                        found = true;
                        report.push(
                            document.clone(),
                            vec![
                                record.iden_number.clone(),
                                record.wholename.clone(),
                                record.subject_type.clone(),
                                record.remark.clone(),
                                record.ref_num.clone(),
                                record.programme.clone(),
                            ],
                        );
                    }
                }
            }

            if !found {
                report.push_uniform(document.clone(), NO_MATCH_MARKER);
            }
            progress.record_done();
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_dataset(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // Column order differs from the output order on purpose; lookups go
    // through the header names.
    const EU_FIXTURE: &str = concat!(
        "FileGenerationDate;EU_ref_num;Naal_wholename;Subject_type;",
        "Entity_remark;Iden_programme;Iden_number\n",
        "2025-05-22;EU.1234.56;SALAZAR RIOS PEDRO;person;",
        "Listed under council decision;COL;00123456\n",
        "2025-05-22;EU.7777.88;ANDES TRADING SL;enterprise;",
        "Front company;VEN;123456-7\n",
        "2025-05-22;EU.9999.11;OTRO SUJETO;person;;IRN;1234567\n",
    );

    async fn run_fixture(documents: &[&str]) -> ServiceReport {
        let file = write_dataset(EU_FIXTURE);
        let screener = ListaEuScreener::from_file("Lista UE", file.path(), b';').unwrap();

        let documents: Vec<String> = documents.iter().map(|d| d.to_string()).collect();
        let progress = ProgressTracker::new("Lista UE", documents.len());
        screener.run(&documents, &progress).await.unwrap()
    }

    #[tokio::test]
    async fn test_zero_padded_list_entry_matches() {
        let report = run_fixture(&["123456"]).await;

        // 00123456 and 123456-7 match; 1234567 must not.
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].values[0], "00123456");
        assert_eq!(report.rows[0].values[1], "SALAZAR RIOS PEDRO");
        assert_eq!(report.rows[0].values[4], "EU.1234.56");
        assert_eq!(report.rows[1].values[0], "123456-7");
    }

    #[tokio::test]
    async fn test_zero_padded_input_matches_too() {
        let report = run_fixture(&["000123456"]).await;

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].document, "000123456");
    }

    #[tokio::test]
    async fn test_longer_number_is_not_a_match() {
        let report = run_fixture(&["23456"]).await;

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].values, vec![NO_MATCH_MARKER; 6]);
    }

    #[tokio::test]
    async fn test_all_zeros_document_never_matches() {
        let report = run_fixture(&["000"]).await;

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].document, "000");
        assert_eq!(report.rows[0].values[0], NO_MATCH_MARKER);
    }

    #[tokio::test]
    async fn test_empty_optional_column_stays_empty() {
        let report = run_fixture(&["1234567"]).await;

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].values[0], "1234567");
        assert_eq!(report.rows[0].values[3], "");
    }

    #[test]
    fn test_missing_iden_number_column_is_rejected() {
        let file = write_dataset("EU_ref_num;Naal_wholename\nEU.1;ALGUIEN\n");
        let err = ListaEuScreener::from_file("Lista UE", file.path(), b';').unwrap_err();

        assert!(err.to_string().contains(IDEN_NUMBER));
    }

    #[test]
    fn test_missing_optional_columns_default_to_empty() {
        let file = write_dataset("Iden_number;Naal_wholename\n555777;ALGUIEN\n");
        let screener = ListaEuScreener::from_file("Lista UE", file.path(), b';').unwrap();

        assert_eq!(screener.records.len(), 1);
        assert_eq!(screener.records[0].wholename, "ALGUIEN");
        assert_eq!(screener.records[0].subject_type, "");
        assert_eq!(screener.records[0].programme, "");
    }
}
