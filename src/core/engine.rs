use crate::config::toml_config::ScreeningConfig;
use crate::core::merge::{merge_reports, to_csv_bytes, to_json_records};
use crate::domain::model::{MergedTable, ServiceReport};
use crate::domain::ports::{Screener, Storage};
use crate::utils::error::{Result, ScreeningError};
use crate::utils::monitor::SystemMonitor;
use crate::utils::progress::ProgressTracker;
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;
use zip::write::{FileOptions, ZipWriter};

/// What happened to one service during a run.
#[derive(Debug, Clone)]
pub struct ServiceOutcome {
    pub service: String,
    pub row_count: usize,
    pub duration: std::time::Duration,
    pub error: Option<String>,
}

/// Result of a whole screening run: per-service outcomes, the merged
/// table, and the files written to storage.
#[derive(Debug)]
pub struct ScreeningRunResult {
    pub outcomes: Vec<ServiceOutcome>,
    pub table: MergedTable,
    pub output_files: Vec<String>,
}

/// Runs the configured screeners in order over one document list, merges
/// their reports and writes the combined output.
///
/// Services run one after another; concurrency lives inside each screener.
/// A failing service is logged and skipped unless the configuration says
/// to stop, so one registry outage cannot void an entire run.
pub struct ScreeningEngine<S: Storage> {
    storage: S,
    config: ScreeningConfig,
    screeners: Vec<Box<dyn Screener>>,
    monitor: Option<SystemMonitor>,
}

impl<S: Storage> ScreeningEngine<S> {
    pub fn new(storage: S, config: ScreeningConfig, screeners: Vec<Box<dyn Screener>>) -> Self {
        Self {
            storage,
            config,
            screeners,
            monitor: None,
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        if enabled {
            self.monitor = Some(SystemMonitor::new(enabled));
        }
        self
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.screeners.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, documents: &[String]) -> Result<ScreeningRunResult> {
        if documents.is_empty() {
            return Err(ScreeningError::InputError {
                message: "No documents to screen".to_string(),
            });
        }

        let run_start = Instant::now();
        if let Some(monitor) = &self.monitor {
            monitor.checkpoint("Screening started");
        }

        let total_services = self.screeners.len();
        let mut outcomes: Vec<ServiceOutcome> = Vec::new();
        let mut reports: Vec<ServiceReport> = Vec::new();

        for (position, screener) in self.screeners.iter().enumerate() {
            let service = screener.name().to_string();
            let service_start = Instant::now();
            tracing::info!(
                "🔍 Service {}/{}: {} ({} documents)",
                position + 1,
                total_services,
                service,
                documents.len()
            );

            let progress = ProgressTracker::new(&service, documents.len());
            match screener.run(documents, &progress).await {
                Ok(report) => {
                    let duration = service_start.elapsed();
                    tracing::info!(
                        "✅ {} terminado: {} rows in {:.1}s ({}/{} completado(s))",
                        service,
                        report.rows.len(),
                        duration.as_secs_f64(),
                        position + 1,
                        total_services
                    );
                    outcomes.push(ServiceOutcome {
                        service,
                        row_count: report.rows.len(),
                        duration,
                        error: None,
                    });
                    reports.push(report);
                }
                Err(e) => {
                    tracing::error!("❌ {} failed: {}", service, e);
                    if self.config.stop_on_service_failure() {
                        return Err(ScreeningError::ServiceError {
                            service,
                            message: e.to_string(),
                        });
                    }
                    tracing::info!("⏭️ Continuing without results from {}", service);
                    outcomes.push(ServiceOutcome {
                        service,
                        row_count: 0,
                        duration: service_start.elapsed(),
                        error: Some(e.to_string()),
                    });
                }
            }

            if let Some(monitor) = &self.monitor {
                monitor.checkpoint(&format!("After service {}/{}", position + 1, total_services));
            }
        }

        let table = merge_reports(documents, &reports);
        let output_files = self.write_outputs(&table).await?;

        tracing::info!(
            "🎉 ¡Completado en {:.1} segundos! ({} columns, {} rows)",
            run_start.elapsed().as_secs_f64(),
            table.columns.len(),
            table.rows.len()
        );
        if let Some(monitor) = &self.monitor {
            monitor.finish();
        }

        Ok(ScreeningRunResult {
            outcomes,
            table,
            output_files,
        })
    }

    /// Renders every configured format; with compression on, the rendered
    /// files go into one archive instead of separate files.
    async fn write_outputs(&self, table: &MergedTable) -> Result<Vec<String>> {
        let base = self.config.base_filename();
        let mut rendered: Vec<(String, Vec<u8>)> = Vec::new();

        for format in &self.config.output.output_formats {
            let entry = match format.as_str() {
                "csv" => (format!("{}.csv", base), to_csv_bytes(table)?),
                "json" => (
                    format!("{}.json", base),
                    serde_json::to_vec_pretty(&to_json_records(table))?,
                ),
                other => {
                    return Err(ScreeningError::InvalidConfigValueError {
                        field: "output.output_formats".to_string(),
                        value: other.to_string(),
                        reason: "Supported formats are csv and json".to_string(),
                    })
                }
            };
            rendered.push(entry);
        }

        let compression = self
            .config
            .output
            .compression
            .as_ref()
            .filter(|c| c.enabled);

        let mut written = Vec::new();
        if let Some(compression) = compression {
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (filename, data) in &rendered {
                    zip.start_file::<_, ()>(filename.as_str(), FileOptions::default())?;
                    zip.write_all(data)?;
                }
                let cursor = zip.finish()?;
                cursor.into_inner()
            };

            tracing::debug!(
                "💾 Writing archive {} ({} bytes, {} files)",
                compression.filename,
                zip_data.len(),
                rendered.len()
            );
            self.storage
                .write_file(&compression.filename, &zip_data)
                .await?;
            written.push(compression.filename.clone());
        } else {
            for (filename, data) in &rendered {
                tracing::debug!("💾 Writing {} ({} bytes)", filename, data.len());
                self.storage.write_file(filename, data).await?;
                written.push(filename.clone());
            }
        }

        Ok(written)
    }
}

/// Run totals in the shape the CLI prints after a run.
pub fn get_execution_summary(outcomes: &[ServiceOutcome]) -> HashMap<String, serde_json::Value> {
    let mut summary = HashMap::new();

    let total_services = outcomes.len();
    let failed_services = outcomes.iter().filter(|o| o.error.is_some()).count();
    let total_rows: usize = outcomes.iter().map(|o| o.row_count).sum();
    let total_duration: std::time::Duration = outcomes.iter().map(|o| o.duration).sum();

    summary.insert(
        "total_services".to_string(),
        serde_json::Value::Number(total_services.into()),
    );
    summary.insert(
        "failed_services".to_string(),
        serde_json::Value::Number(failed_services.into()),
    );
    summary.insert(
        "total_rows".to_string(),
        serde_json::Value::Number(total_rows.into()),
    );
    summary.insert(
        "total_duration_ms".to_string(),
        serde_json::Value::Number((total_duration.as_millis() as u64).into()),
    );

    let service_names: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|o| serde_json::Value::String(o.service.clone()))
        .collect();
    summary.insert(
        "executed_services".to_string(),
        serde_json::Value::Array(service_names),
    );

    summary
}
