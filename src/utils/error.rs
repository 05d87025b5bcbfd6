use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Request to {endpoint} failed: {source}")]
    NetworkError {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {endpoint} returned status {status}")]
    HttpStatusError {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("Response from {endpoint} is not a JSON array: {source}")]
    InvalidPayloadError {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Warehouse connection failed: {message}")]
    ConnectionError { message: String },

    #[error("Loading {table} failed: {message}")]
    LoadError { table: String, message: String },

    #[error("Warehouse statement failed: {message}")]
    StatementError {
        code: Option<String>,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid SQL identifier '{value}': {reason}")]
    InvalidIdentifierError { value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Connection,
    Load,
    Configuration,
    System,
}

impl IngestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NetworkError { .. }
            | Self::HttpStatusError { .. }
            | Self::InvalidPayloadError { .. } => ErrorCategory::Network,
            Self::ConnectionError { .. } => ErrorCategory::Connection,
            Self::LoadError { .. } | Self::StatementError { .. } => ErrorCategory::Load,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidIdentifierError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    /// Attaches the target table to a statement failure raised mid-load.
    pub fn in_table(self, table: &str) -> Self {
        match self {
            Self::StatementError { code, message } => Self::LoadError {
                table: table.to_string(),
                message: match code {
                    Some(code) => format!("{} (code {})", message, code),
                    None => message,
                },
            },
            other => other,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not fetch source data: {}", self),
            ErrorCategory::Connection => format!("Could not connect to the warehouse: {}", self),
            ErrorCategory::Load => format!("Loading into the warehouse failed: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("Unexpected system error: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::MissingConfigError { .. } => {
                "Set the missing SNOWFLAKE_* variable in the environment or in .env"
            }
            Self::InvalidIdentifierError { .. } => {
                "Use letters, digits, '_' or '$' for database, schema and table names"
            }
            Self::HttpStatusError { .. } => "Check that the source endpoint URL is correct",
            _ => match self.category() {
                ErrorCategory::Network => "Check network connectivity to the source API",
                ErrorCategory::Connection => {
                    "Check that every SNOWFLAKE_* variable is set and the account, user and password are correct"
                }
                ErrorCategory::Load => {
                    "The table may be partially loaded; rerun the ingestion to replace it"
                }
                ErrorCategory::Configuration => "Review the command-line flags and dataset file",
                ErrorCategory::System => "Check file permissions and available disk space",
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_in_table_becomes_load_error() {
        let err = IngestError::StatementError {
            code: Some("002003".to_string()),
            message: "Object does not exist".to_string(),
        }
        .in_table("POSTS");

        match &err {
            IngestError::LoadError { table, message } => {
                assert_eq!(table, "POSTS");
                assert!(message.contains("002003"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.category(), ErrorCategory::Load);
    }

    #[test]
    fn test_categories() {
        let missing = IngestError::MissingConfigError {
            field: "SNOWFLAKE_USER".to_string(),
        };
        assert_eq!(missing.category(), ErrorCategory::Configuration);
        assert!(missing.recovery_suggestion().contains("SNOWFLAKE_"));

        let conn = IngestError::ConnectionError {
            message: "bad password".to_string(),
        };
        assert_eq!(conn.category(), ErrorCategory::Connection);
        assert!(conn.user_friendly_message().contains("bad password"));
    }
}
