use crate::config::toml_config::ServiceDefinition;
use crate::domain::model::ServiceReport;
use crate::domain::ports::{IpSource, Screener};
use crate::utils::error::Result;
use crate::utils::ip::RandomIp;
use crate::utils::progress::ProgressTracker;
use crate::utils::validation;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const DEFAULT_MAX_CONCURRENT: usize = 100;
const DEFAULT_IP_INTERVAL: usize = 1000;
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// The endpoint answered but the body carried no `vigencia` field.
const UNAVAILABLE_MARKER: &str = "No disponible";
const ERROR_MARKER: &str = "Error";

/// Cedula vigency lookups against the civil registry. One POST per
/// document with a rotating caller IP in the payload; the registry
/// throttles by that IP, so it changes every `ip_interval` documents.
#[derive(Debug)]
pub struct VigenciaScreener {
    name: String,
    url: String,
    client: Client,
    max_concurrent: usize,
    ip_interval: usize,
    ip_source: Box<dyn IpSource>,
}

impl VigenciaScreener {
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
            ip_interval: definition.ip_interval.unwrap_or(DEFAULT_IP_INTERVAL).max(1),
            ip_source: Box::new(RandomIp::new()),
        })
    }

    /// Swaps the IP source, mainly so tests can pin a fixed address.
    pub fn with_ip_source(mut self, ip_source: Box<dyn IpSource>) -> Self {
        self.ip_source = ip_source;
        self
    }

    async fn lookup(&self, index: usize, document: String, ip: String) -> (usize, String) {
        let payload = json!({ "nuip": document, "ip": ip });

        let vigencia = match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) => match response.json::<serde_json::Value>().await {
                Ok(body) => match body.get("vigencia") {
                    Some(serde_json::Value::String(value)) => value.clone(),
                    Some(other) => other.to_string(),
                    None => UNAVAILABLE_MARKER.to_string(),
                },
                Err(_) => ERROR_MARKER.to_string(),
            },
            Err(_) => ERROR_MARKER.to_string(),
        };

        (index, vigencia)
    }
}

#[async_trait]
impl Screener for VigenciaScreener {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<String> {
        vec!["Vigencia".to_string()]
    }

    async fn run(
        &self,
        documents: &[String],
        progress: &ProgressTracker,
    ) -> Result<ServiceReport> {
        let mut report = ServiceReport::new(self.name.clone(), self.columns());
        let mut results: Vec<Option<String>> = vec![None; documents.len()];
        let mut futures = FuturesUnordered::new();

        let mut current_ip = self.ip_source.next_ip();

        for (index, document) in documents.iter().enumerate() {
            // Not on the first document; every ip_interval afterwards.
            if index > 0 && index % self.ip_interval == 0 {
                current_ip = self.ip_source.next_ip();
                tracing::debug!(
                    "🔄 {}: new caller IP after {} documents",
                    self.name,
                    index
                );
            }

            futures.push(self.lookup(index, document.clone(), current_ip.clone()));

            while futures.len() >= self.max_concurrent {
                if let Some((done_index, vigencia)) = futures.next().await {
                    results[done_index] = Some(vigencia);
                    progress.record_done();
                }
            }
        }

        while let Some((done_index, vigencia)) = futures.next().await {
            results[done_index] = Some(vigencia);
            progress.record_done();
        }

        for (index, document) in documents.iter().enumerate() {
            let vigencia = results[index].take().unwrap_or_else(|| ERROR_MARKER.to_string());
            report.push(document.clone(), vec![vigencia]);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FixedIp(&'static str);

    impl IpSource for FixedIp {
        fn next_ip(&self) -> String {
            self.0.to_string()
        }
    }

    #[derive(Debug)]
    struct CountingIp(std::sync::Arc<AtomicUsize>);

    impl IpSource for CountingIp {
        fn next_ip(&self) -> String {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            format!("10.0.0.{}", n + 1)
        }
    }

    fn definition(url: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: "Vigencia Cedula".to_string(),
            r#type: "vigencia".to_string(),
            enabled: None,
            url: Some(url.to_string()),
            dataset: None,
            delimiter: None,
            max_concurrent: Some(4),
            ip_interval: None,
            timeout_seconds: Some(5),
            retry_attempts: None,
            retry_delay_seconds: None,
        }
    }

    #[tokio::test]
    async fn test_run_reads_vigencia_field() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/consulta")
                .json_body_partial(r#"{"nuip": "1016025889"}"#);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({ "vigencia": "VIGENTE" }));
        });

        let screener = VigenciaScreener::from_definition(&definition(&server.url("/consulta")))
            .unwrap()
            .with_ip_source(Box::new(FixedIp("10.1.2.3")));

        let documents = vec!["1016025889".to_string()];
        let progress = ProgressTracker::new("Vigencia Cedula", documents.len());
        let report = screener.run(&documents, &progress).await.unwrap();

        mock.assert();
        assert_eq!(report.columns, vec!["Vigencia"]);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].document, "1016025889");
        assert_eq!(report.rows[0].values, vec!["VIGENTE"]);
        assert_eq!(progress.done(), 1);
    }

    #[tokio::test]
    async fn test_missing_vigencia_field_is_not_available() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/consulta");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({ "mensaje": "sin datos" }));
        });

        let screener =
            VigenciaScreener::from_definition(&definition(&server.url("/consulta"))).unwrap();

        let documents = vec!["99999999".to_string()];
        let progress = ProgressTracker::new("Vigencia Cedula", documents.len());
        let report = screener.run(&documents, &progress).await.unwrap();

        assert_eq!(report.rows[0].values, vec!["No disponible"]);
    }

    #[tokio::test]
    async fn test_non_json_body_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/consulta");
            then.status(200).body("<html>mantenimiento</html>");
        });

        let screener =
            VigenciaScreener::from_definition(&definition(&server.url("/consulta"))).unwrap();

        let documents = vec!["1016025889".to_string()];
        let progress = ProgressTracker::new("Vigencia Cedula", documents.len());
        let report = screener.run(&documents, &progress).await.unwrap();

        assert_eq!(report.rows[0].values, vec!["Error"]);
    }

    #[tokio::test]
    async fn test_rows_keep_input_order() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/consulta");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({ "vigencia": "VIGENTE" }));
        });

        let screener =
            VigenciaScreener::from_definition(&definition(&server.url("/consulta"))).unwrap();

        let documents: Vec<String> = (1..=10).map(|n| format!("100{:02}", n)).collect();
        let progress = ProgressTracker::new("Vigencia Cedula", documents.len());
        let report = screener.run(&documents, &progress).await.unwrap();

        assert_eq!(report.rows.len(), 10);
        for (row, document) in report.rows.iter().zip(&documents) {
            assert_eq!(&row.document, document);
        }
        assert_eq!(progress.done(), 10);
    }

    #[tokio::test]
    async fn test_ip_rotates_on_interval() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/consulta");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({ "vigencia": "VIGENTE" }));
        });

        let mut definition = definition(&server.url("/consulta"));
        definition.ip_interval = Some(2);

        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let screener = VigenciaScreener::from_definition(&definition)
            .unwrap()
            .with_ip_source(Box::new(CountingIp(std::sync::Arc::clone(&calls))));

        // 5 documents with interval 2: one IP at the start plus
        // rotations at index 2 and 4.
        let documents: Vec<String> = (1..=5).map(|n| n.to_string()).collect();
        let progress = ProgressTracker::new("Vigencia Cedula", documents.len());
        let report = screener.run(&documents, &progress).await.unwrap();

        assert_eq!(report.rows.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
