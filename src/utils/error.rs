use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidatorError {
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

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Input error: {message}")]
    InputError { message: String },

    #[error("Lookup service answered with HTTP {status}")]
    HttpStatusError { status: u16 },

    #[error("Lookup call timed out after {seconds}s")]
    TimeoutError { seconds: u64 },

    #[error("Lookup could not be dispatched: {message}")]
    DispatchError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ValidatorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::InputError { .. } | Self::CsvError(_) => ErrorCategory::Input,
            Self::ApiError(_)
            | Self::HttpStatusError { .. }
            | Self::TimeoutError { .. }
            | Self::DispatchError { .. } => ErrorCategory::Network,
            Self::SerializationError(_) => ErrorCategory::Data,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // lookup failures are retried, they only surface when a caller
            // uses the client directly
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Input | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Whether the retry orchestrator may recover from this error.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Network || matches!(self, Self::SerializationError(_))
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingConfigError { field } => {
                format!("The configuration file does not define '{}'", field)
            }
            Self::InvalidConfigValueError { field, value, .. } => {
                format!("The configuration value '{}' for '{}' is not usable", value, field)
            }
            Self::ConfigError { message } => format!("Configuration problem: {}", message),
            Self::InputError { message } => format!("Could not use the input table: {}", message),
            Self::CsvError(e) => format!("The input table is not valid CSV: {}", e),
            Self::IoError(e) => format!("File system error: {}", e),
            Self::ApiError(_)
            | Self::HttpStatusError { .. }
            | Self::TimeoutError { .. }
            | Self::DispatchError { .. } => {
                format!("The lookup service could not be reached: {}", self)
            }
            Self::SerializationError(e) => format!("Unexpected data format: {}", e),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check config.txt: batch_size, concurrency, retries and license are required"
            }
            ErrorCategory::Input => {
                "Make sure the input file exists and holds phone numbers in its first column"
            }
            ErrorCategory::Network => "Check network access and the endpoint, then run again",
            ErrorCategory::Data => "The lookup service changed its response format",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidatorError>;
