use crate::config::toml_config::ServiceDefinition;
use crate::domain::model::ServiceReport;
use crate::domain::ports::Screener;
use crate::utils::error::Result;
use crate::utils::progress::ProgressTracker;
use crate::utils::validation;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

// The consultation page is rendered for browsers and answers slowly;
// keep the fan-out narrow and retry on transport failures.
const DEFAULT_MAX_CONCURRENT: usize = 10;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 2;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/114.0.0.0 Safari/537.36";

const NOT_FOUND_MARKER: &str = "No existe";
const ERROR_MARKER: &str = "Error";

const OUTPUT_COLUMNS: &[&str] = &[
    "Declarante",
    "Entidad",
    "Cargo",
    "Tipo Declaración",
    "Declaración N°",
    "Fecha Publicación",
    "Estado",
];

/// Income-and-assets declarations of public servants. The consultation
/// endpoint only offers an HTML search form, so results are screen-scraped
/// from the result table and filtered by exact document number.
#[derive(Debug)]
pub struct FuncionPublicaScreener {
    name: String,
    url: String,
    client: Client,
    max_concurrent: usize,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl FuncionPublicaScreener {
    pub fn from_definition(definition: &ServiceDefinition) -> Result<Self> {
        let field = format!("services.{}.url", definition.name);
        let url = validation::validate_required_field(&field, &definition.url)?;

        let timeout = definition
            .timeout_seconds
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let client = Client::builder()
            .user_agent(USER_AGENT)
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
            retry_attempts: definition
                .retry_attempts
                .unwrap_or(DEFAULT_RETRY_ATTEMPTS)
                .max(1),
            retry_delay: Duration::from_secs(
                definition
                    .retry_delay_seconds
                    .unwrap_or(DEFAULT_RETRY_DELAY_SECONDS),
            ),
        })
    }

    async fn fetch_declarations(&self, document: &str) -> Result<Vec<Vec<String>>> {
        let params = [
            ("tipoPersonaId", "25"),
            ("primerNombre", ""),
            ("segundoNombre", ""),
            ("primerApellido", ""),
            ("segundoApellido", ""),
            ("numeroDocumento", document),
            ("entidad", ""),
            ("fechaFinalizacionDesde", ""),
            ("fechaFinalizacionHasta", ""),
            ("find", "Buscar"),
        ];

        let response = self.client.get(&self.url).query(&params).send().await?;
        let html = response.text().await?;
        Ok(parse_declarations(&html, document))
    }

    async fn lookup(&self, index: usize, document: String) -> (usize, Vec<Vec<String>>) {
        let mut attempt = 0;
        loop {
            match self.fetch_declarations(&document).await {
                Ok(rows) => return (index, rows),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry_attempts {
                        tracing::warn!(
                            "❌ {}: document {} failed after {} attempts: {}",
                            self.name,
                            document,
                            attempt,
                            e
                        );
                        return (
                            index,
                            vec![vec![ERROR_MARKER.to_string(); OUTPUT_COLUMNS.len()]],
                        );
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

/// Pulls the result-table rows whose cedula cell matches `document`
/// exactly. An empty page or no matching row yields one "No existe" row.
fn parse_declarations(html: &str, document: &str) -> Vec<Vec<String>> {
    let page = Html::parse_document(html);
    let row_selector = Selector::parse("table.table tbody tr").unwrap();
    let cedula_selector = Selector::parse("td > p:nth-of-type(2)").unwrap();
    let declarant_selector = Selector::parse("td > p:nth-of-type(1)").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let cedula_pattern = Regex::new(r"CEDULA DE CIUDADANIA\s*-\s*(\d+)").unwrap();

    let mut rows = Vec::new();

    for row in page.select(&row_selector) {
        let cedula_cell = match row.select(&cedula_selector).next() {
            Some(cell) => cell,
            None => continue,
        };
        let cedula_text = cedula_cell.text().collect::<String>();
        let captures = match cedula_pattern.captures(&cedula_text) {
            Some(captures) => captures,
            None => continue,
        };
        if captures[1].trim() != document {
            continue;
        }

        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() < 8 {
            tracing::warn!(
                "Result row for {} has {} cells instead of 8, skipping",
                document,
                cells.len()
            );
            continue;
        }
        let declarant = row
            .select(&declarant_selector)
            .next()
            .map(|cell| cell_text(&cell))
            .unwrap_or_default();

        rows.push(vec![
            declarant,
            cell_text(&cells[2]),
            cell_text(&cells[3]),
            cell_text(&cells[4]),
            cell_text(&cells[5]),
            cell_text(&cells[6]),
            cell_text(&cells[7]),
        ]);
    }

    if rows.is_empty() {
        rows.push(vec![NOT_FOUND_MARKER.to_string(); OUTPUT_COLUMNS.len()]);
    }
    rows
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[async_trait]
impl Screener for FuncionPublicaScreener {
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
        let mut results: Vec<Option<Vec<Vec<String>>>> = vec![None; documents.len()];
        let mut futures = FuturesUnordered::new();

        for (index, document) in documents.iter().enumerate() {
            futures.push(self.lookup(index, document.clone()));

            while futures.len() >= self.max_concurrent {
                if let Some((done_index, rows)) = futures.next().await {
                    results[done_index] = Some(rows);
                    progress.record_done();
                }
            }
        }

        while let Some((done_index, rows)) = futures.next().await {
            results[done_index] = Some(rows);
            progress.record_done();
        }

        for (index, document) in documents.iter().enumerate() {
            let rows = results[index]
                .take()
                .unwrap_or_else(|| vec![vec![ERROR_MARKER.to_string(); OUTPUT_COLUMNS.len()]]);
            for values in rows {
                report.push(document.clone(), values);
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const RESULT_PAGE: &str = r#"
        <html><body>
        <table class="table">
          <tbody>
            <tr>
              <td>
                <p>PEREZ GOMEZ JUAN CARLOS</p>
                <p>CEDULA DE CIUDADANIA - 1016025889</p>
              </td>
              <td><img src="foto.png"/></td>
              <td>ALCALDIA DE BOGOTA</td>
              <td>SECRETARIO DE DESPACHO</td>
              <td>Periódica</td>
              <td>2023-00431</td>
              <td>2023-05-12</td>
              <td>Publicada</td>
            </tr>
            <tr>
              <td>
                <p>RAMIREZ SOTO ANA</p>
                <p>CEDULA DE CIUDADANIA - 52888999</p>
              </td>
              <td><img src="foto.png"/></td>
              <td>GOBERNACION DEL VALLE</td>
              <td>ASESORA</td>
              <td>Inicial</td>
              <td>2022-00017</td>
              <td>2022-01-30</td>
              <td>Publicada</td>
            </tr>
          </tbody>
        </table>
        </body></html>
    "#;

    fn definition(url: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: "Funcion Publica".to_string(),
            r#type: "funcion_publica".to_string(),
            enabled: None,
            url: Some(url.to_string()),
            dataset: None,
            delimiter: None,
            max_concurrent: Some(2),
            ip_interval: None,
            timeout_seconds: Some(5),
            retry_attempts: Some(2),
            retry_delay_seconds: Some(0),
        }
    }

    #[test]
    fn test_parse_keeps_only_matching_cedula() {
        let rows = parse_declarations(RESULT_PAGE, "1016025889");

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            vec![
                "PEREZ GOMEZ JUAN CARLOS",
                "ALCALDIA DE BOGOTA",
                "SECRETARIO DE DESPACHO",
                "Periódica",
                "2023-00431",
                "2023-05-12",
                "Publicada",
            ]
        );
    }

    #[test]
    fn test_parse_without_match_yields_no_existe() {
        let rows = parse_declarations(RESULT_PAGE, "11111111");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], vec![NOT_FOUND_MARKER; OUTPUT_COLUMNS.len()]);
    }

    #[test]
    fn test_parse_empty_page_yields_no_existe() {
        let rows = parse_declarations("<html><body>Sin resultados</body></html>", "1016025889");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], NOT_FOUND_MARKER);
    }

    #[test]
    fn test_parse_collects_every_declaration_of_the_document() {
        let page = RESULT_PAGE.replace("52888999", "1016025889");
        let rows = parse_declarations(&page, "1016025889");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "PEREZ GOMEZ JUAN CARLOS");
        assert_eq!(rows[1][0], "RAMIREZ SOTO ANA");
    }

    #[tokio::test]
    async fn test_run_queries_with_document_number() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/consultaCiudadana/index")
                .query_param("numeroDocumento", "1016025889")
                .query_param("find", "Buscar");
            then.status(200)
                .header("Content-Type", "text/html")
                .body(RESULT_PAGE);
        });

        let screener = FuncionPublicaScreener::from_definition(&definition(
            &server.url("/consultaCiudadana/index"),
        ))
        .unwrap();

        let documents = vec!["1016025889".to_string()];
        let progress = ProgressTracker::new("Funcion Publica", documents.len());
        let report = screener.run(&documents, &progress).await.unwrap();

        mock.assert();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].document, "1016025889");
        assert_eq!(report.rows[0].values[1], "ALCALDIA DE BOGOTA");
        assert_eq!(progress.done(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_exhausts_retries() {
        // Nothing listens on port 9; both attempts fail fast.
        let mut definition = definition("http://127.0.0.1:9/consulta");
        definition.timeout_seconds = Some(1);

        let screener = FuncionPublicaScreener::from_definition(&definition).unwrap();

        let documents = vec!["1016025889".to_string()];
        let progress = ProgressTracker::new("Funcion Publica", documents.len());
        let report = screener.run(&documents, &progress).await.unwrap();

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].values, vec![ERROR_MARKER; OUTPUT_COLUMNS.len()]);
    }
}
