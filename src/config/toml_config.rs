use crate::utils::error::{Result, ScreeningError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Service types the registry can build.
pub const KNOWN_SERVICE_TYPES: &[&str] =
    &["vigencia", "morosidad", "funcion_publica", "sdn", "lista_eu"];

pub const VALID_OUTPUT_FORMATS: &[&str] = &["csv", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    pub screening: ScreeningInfo,
    pub services: Vec<ServiceDefinition>,
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
    pub error_handling: Option<ErrorHandlingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    /// Default input file; the command line overrides it.
    pub input: Option<String>,
}

/// One `[[services]]` block. Which fields are required depends on `type`:
/// HTTP services (`vigencia`, `morosidad`, `funcion_publica`) need `url`,
/// dataset services (`sdn`, `lista_eu`) need `dataset`. Tuning fields fall
/// back to per-service defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub r#type: String,
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub dataset: Option<String>,
    pub delimiter: Option<String>,
    pub max_concurrent: Option<usize>,
    pub ip_interval: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

impl ServiceDefinition {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    /// Base filename without extension.
    pub filename: Option<String>,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    /// Run-metrics JSON written into the output directory after a
    /// monitored run.
    pub metrics_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// "continue" (default) keeps going when one service fails, "stop"
    /// aborts the run.
    pub on_service_failure: Option<String>,
}

impl ScreeningConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScreeningError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScreeningError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR_NAME}` placeholders with environment values.
    /// Unknown variables are left as-is so validation can report them.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(ScreeningError::ConfigValidationError {
                field: "services".to_string(),
                message: "At least one [[services]] block is required".to_string(),
            });
        }

        let mut seen_names = std::collections::HashSet::new();
        for service in &self.services {
            validation::validate_non_empty_string("services.name", &service.name)?;

            if !seen_names.insert(service.name.as_str()) {
                return Err(ScreeningError::ConfigValidationError {
                    field: "services.name".to_string(),
                    message: format!(
                        "Duplicate service name '{}'; names become report column prefixes and must be unique",
                        service.name
                    ),
                });
            }

            self.validate_service(service)?;
        }

        validation::validate_path("output.path", &self.output.path)?;
        if let Some(filename) = &self.output.filename {
            validation::validate_non_empty_string("output.filename", filename)?;
        }

        if self.output.output_formats.is_empty() {
            return Err(ScreeningError::ConfigValidationError {
                field: "output.output_formats".to_string(),
                message: "At least one output format is required".to_string(),
            });
        }
        for format in &self.output.output_formats {
            if !VALID_OUTPUT_FORMATS.contains(&format.as_str()) {
                return Err(ScreeningError::InvalidConfigValueError {
                    field: "output.output_formats".to_string(),
                    value: format.clone(),
                    reason: format!(
                        "Unsupported format. Valid formats: {}",
                        VALID_OUTPUT_FORMATS.join(", ")
                    ),
                });
            }
        }

        if let Some(error_handling) = &self.error_handling {
            if let Some(mode) = &error_handling.on_service_failure {
                if mode != "continue" && mode != "stop" {
                    return Err(ScreeningError::InvalidConfigValueError {
                        field: "error_handling.on_service_failure".to_string(),
                        value: mode.clone(),
                        reason: "Must be 'continue' or 'stop'".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_service(&self, service: &ServiceDefinition) -> Result<()> {
        let field = |suffix: &str| format!("services.{}.{}", service.name, suffix);

        if !KNOWN_SERVICE_TYPES.contains(&service.r#type.as_str()) {
            return Err(ScreeningError::InvalidConfigValueError {
                field: field("type"),
                value: service.r#type.clone(),
                reason: format!(
                    "Unknown service type. Known types: {}",
                    KNOWN_SERVICE_TYPES.join(", ")
                ),
            });
        }

        match service.r#type.as_str() {
            "vigencia" | "morosidad" | "funcion_publica" => {
                let url = validation::validate_required_field(&field("url"), &service.url)?;
                validation::validate_url(&field("url"), url)?;
            }
            "sdn" | "lista_eu" => {
                let dataset =
                    validation::validate_required_field(&field("dataset"), &service.dataset)?;
                validation::validate_path(&field("dataset"), dataset)?;
                validation::validate_file_extensions(
                    &field("dataset"),
                    &[dataset.clone()],
                    &["csv"],
                )?;
            }
            _ => unreachable!("type checked against KNOWN_SERVICE_TYPES"),
        }

        if let Some(delimiter) = &service.delimiter {
            if delimiter.len() != 1 || !delimiter.is_ascii() {
                return Err(ScreeningError::InvalidConfigValueError {
                    field: field("delimiter"),
                    value: delimiter.clone(),
                    reason: "Delimiter must be a single ASCII character".to_string(),
                });
            }
        }

        if let Some(max_concurrent) = service.max_concurrent {
            validation::validate_range(&field("max_concurrent"), max_concurrent, 1, 1000)?;
        }
        if let Some(ip_interval) = service.ip_interval {
            validation::validate_positive_number(&field("ip_interval"), ip_interval, 1)?;
        }
        if let Some(timeout) = service.timeout_seconds {
            validation::validate_positive_number(&field("timeout_seconds"), timeout as usize, 1)?;
        }

        Ok(())
    }

    pub fn get_service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Enabled services in file order.
    pub fn enabled_services(&self) -> Vec<&ServiceDefinition> {
        self.services.iter().filter(|s| s.is_enabled()).collect()
    }

    pub fn input_path(&self) -> Option<&str> {
        self.screening.input.as_deref()
    }

    pub fn output_path(&self) -> &str {
        &self.output.path
    }

    pub fn base_filename(&self) -> &str {
        self.output
            .filename
            .as_deref()
            .unwrap_or("resultados_scrapers_combinados")
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn metrics_file(&self) -> &str {
        self.monitoring
            .as_ref()
            .and_then(|m| m.metrics_file.as_deref())
            .unwrap_or("resumen_ejecucion.json")
    }

    pub fn stop_on_service_failure(&self) -> bool {
        self.error_handling
            .as_ref()
            .and_then(|e| e.on_service_failure.as_deref())
            .map(|mode| mode == "stop")
            .unwrap_or(false)
    }
}

impl Validate for ScreeningConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
