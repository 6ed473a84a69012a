use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Request to {url} failed: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatusError { url: String, status: u16 },

    #[error("Parse error in {url}: {message}")]
    ParseError { url: String, message: String },

    #[error("Failed to write {path}: {source}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Parse,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Recoverable at record level.
    Low,
    /// Transient; rerunning may help.
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn parse(url: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::ParseError {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn file_write(path: impl Into<String>, source: std::io::Error) -> Self {
        EtlError::FileWriteError {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::NetworkError { .. } | EtlError::HttpStatusError { .. } => {
                ErrorCategory::Network
            }
            EtlError::ParseError { .. } => ErrorCategory::Parse,
            EtlError::FileWriteError { .. }
            | EtlError::CsvError(_)
            | EtlError::IoError(_)
            | EtlError::SerializationError(_) => ErrorCategory::Storage,
            EtlError::ConfigValidationError { .. } | EtlError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Parse => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// Whether the run can continue past this error by dropping one record.
    pub fn is_recoverable(&self) -> bool {
        self.severity() == ErrorSeverity::Low
    }

    /// Process exit code for an error that reached the top level.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::NetworkError { url, .. } => format!("Could not reach {}", url),
            EtlError::HttpStatusError { url, status } => {
                format!("The site answered {} for {}", status, url)
            }
            EtlError::ParseError { url, message } => {
                format!("Unexpected page layout at {}: {}", url, message)
            }
            EtlError::FileWriteError { path, .. } => format!("Could not write {}", path),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check your connection and the --base-url value, then rerun",
            ErrorCategory::Parse => {
                "The site markup may have changed; update the [selectors] section of the config file"
            }
            ErrorCategory::Storage => "Check that the output directory exists and is writable",
            ErrorCategory::Configuration => "Fix the reported configuration value and rerun",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_recoverable() {
        let err = EtlError::parse("https://example.com/robin", "missing name");
        assert!(err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Parse);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_fatal_errors_exit_non_zero() {
        let status = EtlError::HttpStatusError {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert!(!status.is_recoverable());
        assert_eq!(status.exit_code(), 2);

        let write = EtlError::file_write(
            "out/output.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(write.severity(), ErrorSeverity::Critical);
        assert_eq!(write.exit_code(), 3);
        assert!(write.user_friendly_message().contains("out/output.csv"));
    }
}
