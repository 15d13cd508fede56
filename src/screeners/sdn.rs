use crate::config::toml_config::ServiceDefinition;
use crate::domain::model::ServiceReport;
use crate::domain::ports::Screener;
use crate::utils::error::{Result, ScreeningError};
use crate::utils::progress::ProgressTracker;
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

const DEFAULT_DELIMITER: u8 = b',';

pub const NO_MATCH_MARKER: &str = "Sin coincidencias";

const OUTPUT_COLUMNS: &[&str] = &["Nombre_OFAC", "Tipo_OFAC", "Comentarios_OFAC"];

// Positional layout of the raw OFAC export; the file ships without headers.
// Only name, type and remarks are carried into reports.
const NAME_INDEX: usize = 1;
const TYPE_INDEX: usize = 2;
const REMARKS_INDEX: usize = 11;
const LAYOUT_WIDTH: usize = 12;

/// OFAC sanctions screening against a local SDN export. Documents are
/// matched as whole words inside the free-text remarks column, where the
/// list records cedula and passport numbers.
#[derive(Debug)]
pub struct SdnScreener {
    name: String,
    records: Vec<SdnRecord>,
}

#[derive(Debug, Clone)]
struct SdnRecord {
    name: String,
    kind: String,
    remarks: String,
}

impl SdnScreener {
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

    /// Loads the dataset once; lookups afterwards are in-memory.
    pub fn from_file<P: AsRef<Path>>(name: &str, path: P, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| ScreeningError::DatasetError {
                message: format!(
                    "Cannot open SDN dataset {}: {}",
                    path.as_ref().display(),
                    e
                ),
            })?;

        let mut records = Vec::new();
        let mut widest = 0;

        for result in reader.records() {
            let record = result?;
            widest = widest.max(record.len());
            // Rows wider than the published layout are malformed exports.
            if record.len() > LAYOUT_WIDTH {
                continue;
            }
            records.push(SdnRecord {
                name: field(&record, NAME_INDEX),
                kind: field(&record, TYPE_INDEX),
                remarks: field(&record, REMARKS_INDEX),
            });
        }

        if widest <= REMARKS_INDEX {
            return Err(ScreeningError::DatasetError {
                message: format!(
                    "SDN dataset {} has no remarks column; expected {} comma-separated fields",
                    path.as_ref().display(),
                    LAYOUT_WIDTH
                ),
            });
        }

        tracing::debug!("📁 Loaded {} SDN records from {}", records.len(), path.as_ref().display());

        Ok(Self {
            name: name.to_string(),
            records,
        })
    }
}

fn field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").to_string()
}

/// One alternation over every unique document, used to narrow the list
/// before per-document matching.
fn combined_pattern(unique: &BTreeSet<&str>) -> Result<Regex> {
    let escaped: Vec<String> = unique.iter().map(|d| regex::escape(d)).collect();
    let pattern = format!(r"\b(?:{})\b", escaped.join("|"));
    Regex::new(&pattern).map_err(|e| ScreeningError::ProcessingError {
        message: format!("Cannot build SDN search pattern: {}", e),
    })
}

fn document_pattern(document: &str) -> Result<Regex> {
    let pattern = format!(r"\b{}\b", regex::escape(document));
    Regex::new(&pattern).map_err(|e| ScreeningError::ProcessingError {
        message: format!("Cannot build SDN search pattern for '{}': {}", document, e),
    })
}

#[async_trait]
impl Screener for SdnScreener {
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
            .map(|d| d.trim())
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
        let candidates: Vec<&SdnRecord> = self
            .records
            .iter()
            .filter(|record| prefilter.is_match(&record.remarks))
            .collect();

        let mut patterns: HashMap<&str, Regex> = HashMap::new();
        for document in &unique {
            patterns.insert(document, document_pattern(document)?);
        }

        for document in documents {
            let trimmed = document.trim();
            let mut found = false;

            if let Some(pattern) = patterns.get(trimmed) {
                for record in &candidates {
                    if pattern.is_match(&record.remarks) {
                        found = true;
                        report.push(
                            trimmed,
                            vec![
                                record.name.clone(),
                                record.kind.clone(),
                                record.remarks.clone(),
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
