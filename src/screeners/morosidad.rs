use crate::config::toml_config::ServiceDefinition;
use crate::domain::model::ServiceReport;
use crate::domain::ports::Screener;
use crate::utils::error::Result;
use crate::utils::progress::ProgressTracker;
use crate::utils::validation;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_MAX_CONCURRENT: usize = 100;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

const DELINQUENT_STATE: &str = "Moroso";
const CLEAR_STATE: &str = "No moroso";
const ERROR_MARKER: &str = "Error";

/// Judiciary delinquent-debtors bulletin. POST per document; a hit carries
/// the sanctioned party name, everything else degrades to a state marker.
#[derive(Debug)]
pub struct MorosidadScreener {
    name: String,
    url: String,
    client: Client,
    max_concurrent: usize,
}

#[derive(Debug, Deserialize)]
struct BulletinResponse {
    #[serde(rename = "Total", default)]
    total: i64,
    #[serde(rename = "Data", default)]
    data: Vec<BulletinRecord>,
}

#[derive(Debug, Deserialize)]
struct BulletinRecord {
    #[serde(rename = "Sancionado", default)]
    sancionado: serde_json::Value,
}

impl MorosidadScreener {
    pub fn from_definition(definition: &ServiceDefinition) -> Result<Self> {
        let field = format!("services.{}.url", definition.name);
        let url = validation::validate_required_field(&field, &definition.url)?;

        let timeout = definition
            .timeout_seconds
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            name: definition.name.clone(),
            url: url.clone(),
            client,
            max_concurrent: definition
                .max_concurrent
                .unwrap_or(DEFAULT_MAX_CONCURRENT)
                .max(1),
        })
    }

    async fn lookup(&self, index: usize, document: String) -> (usize, Vec<String>) {
        let payload = json!({ "Documento": document });

        let (sancionado, estado) = match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                match response.json::<BulletinResponse>().await {
                    Ok(body) => {
                        if body.total != 0 && !body.data.is_empty() {
                            (value_text(&body.data[0].sancionado), DELINQUENT_STATE.to_string())
                        } else {
                            (String::new(), CLEAR_STATE.to_string())
                        }
                    }
                    Err(_) => (String::new(), ERROR_MARKER.to_string()),
                }
            }
            Ok(response) => (
                String::new(),
                format!("Error {}", response.status().as_u16()),
            ),
            Err(_) => (String::new(), ERROR_MARKER.to_string()),
        };

        (index, vec![sancionado, estado])
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Screener for MorosidadScreener {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<String> {
        vec!["Sancionado".to_string(), "Estado".to_string()]
    }

    async fn run(
        &self,
        documents: &[String],
        progress: &ProgressTracker,
    ) -> Result<ServiceReport> {
        let mut report = ServiceReport::new(self.name.clone(), self.columns());
        let mut results: Vec<Option<Vec<String>>> = vec![None; documents.len()];
        let mut futures = FuturesUnordered::new();

        for (index, document) in documents.iter().enumerate() {
            futures.push(self.lookup(index, document.clone()));

            while futures.len() >= self.max_concurrent {
                if let Some((done_index, values)) = futures.next().await {
                    results[done_index] = Some(values);
                    progress.record_done();
                }
            }
        }

        while let Some((done_index, values)) = futures.next().await {
            results[done_index] = Some(values);
            progress.record_done();
        }

        for (index, document) in documents.iter().enumerate() {
            let values = results[index]
                .take()
                .unwrap_or_else(|| vec![String::new(), ERROR_MARKER.to_string()]);
            report.push(document.clone(), values);
        }

        Ok(report)
    }
}
