use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Input error: {message}")]
    InputError { message: String },

    #[error("Dataset error: {message}")]
    DatasetError { message: String },

    #[error("Service '{service}' failed: {message}")]
    ServiceError { service: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// Severity drives the process exit code: Low = 0, Medium = 2, High = 1,
/// Critical = 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Input,
    Dataset,
    Data,
    System,
}

impl ScreeningError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ScreeningError::ApiError(_) | ScreeningError::ServiceError { .. } => {
                ErrorSeverity::Medium
            }
            ScreeningError::ConfigError { .. }
            | ScreeningError::ConfigValidationError { .. }
            | ScreeningError::InvalidConfigValueError { .. }
            | ScreeningError::MissingConfigError { .. }
            | ScreeningError::InputError { .. }
            | ScreeningError::DatasetError { .. }
            | ScreeningError::CsvError(_)
            | ScreeningError::SerializationError(_)
            | ScreeningError::ProcessingError { .. } => ErrorSeverity::High,
            ScreeningError::IoError(_) | ScreeningError::ZipError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ScreeningError::ApiError(_) | ScreeningError::ServiceError { .. } => {
                ErrorCategory::Network
            }
            ScreeningError::ConfigError { .. }
            | ScreeningError::ConfigValidationError { .. }
            | ScreeningError::InvalidConfigValueError { .. }
            | ScreeningError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ScreeningError::InputError { .. } => ErrorCategory::Input,
            ScreeningError::DatasetError { .. } => ErrorCategory::Dataset,
            ScreeningError::CsvError(_)
            | ScreeningError::SerializationError(_)
            | ScreeningError::ProcessingError { .. } => ErrorCategory::Data,
            ScreeningError::IoError(_) | ScreeningError::ZipError(_) => ErrorCategory::System,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ScreeningError::ApiError(e) => {
                if e.is_timeout() {
                    "The service did not answer in time. Lower max_concurrent or raise timeout_seconds and retry".to_string()
                } else if e.is_connect() {
                    "Could not reach the service. Check the URL and your network connectivity".to_string()
                } else {
                    "Check the service endpoint and retry later".to_string()
                }
            }
            ScreeningError::ServiceError { service, .. } => {
                format!(
                    "Disable the '{}' service in the config or fix its settings and retry",
                    service
                )
            }
            ScreeningError::ConfigError { .. } | ScreeningError::ConfigValidationError { .. } => {
                "Review the TOML configuration file against the documented layout".to_string()
            }
            ScreeningError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the configuration file", field)
            }
            ScreeningError::MissingConfigError { field } => {
                format!(
                    "Provide '{}' via the configuration file or the command line",
                    field
                )
            }
            ScreeningError::InputError { .. } => {
                "The input must be a single-column file of document numbers with a header row"
                    .to_string()
            }
            ScreeningError::DatasetError { .. } => {
                "Check the dataset path, delimiter and column layout in the service configuration"
                    .to_string()
            }
            ScreeningError::CsvError(_) => {
                "Check the file for malformed rows or a wrong delimiter".to_string()
            }
            ScreeningError::SerializationError(_) => {
                "The report could not be serialized; inspect the offending record".to_string()
            }
            ScreeningError::ProcessingError { .. } => {
                "Re-run with --verbose to locate the failing step".to_string()
            }
            ScreeningError::IoError(_) => {
                "Check file permissions and available disk space".to_string()
            }
            ScreeningError::ZipError(_) => {
                "Disable output compression or check available disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ScreeningError::ApiError(_) => "A screening service could not be reached".to_string(),
            ScreeningError::ServiceError { service, message } => {
                format!("The '{}' service failed: {}", service, message)
            }
            ScreeningError::ConfigError { message } => {
                format!("The configuration is invalid: {}", message)
            }
            ScreeningError::ConfigValidationError { field, message } => {
                format!("The configuration field '{}' is invalid: {}", field, message)
            }
            ScreeningError::InvalidConfigValueError {
                field,
                value,
                reason,
            } => {
                format!("'{}' is not a valid value for '{}': {}", value, field, reason)
            }
            ScreeningError::MissingConfigError { field } => {
                format!("Required setting '{}' was not provided", field)
            }
            ScreeningError::InputError { message } => {
                format!("The input file could not be used: {}", message)
            }
            ScreeningError::DatasetError { message } => {
                format!("A screening dataset could not be read: {}", message)
            }
            ScreeningError::CsvError(e) => format!("A CSV file could not be processed: {}", e),
            ScreeningError::SerializationError(_) => {
                "The report could not be written as JSON".to_string()
            }
            ScreeningError::ProcessingError { message } => {
                format!("Report assembly failed: {}", message)
            }
            ScreeningError::IoError(e) => format!("A file operation failed: {}", e),
            ScreeningError::ZipError(_) => "The report archive could not be created".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScreeningError>;
