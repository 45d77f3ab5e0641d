//! Error handling for the Inkbridge engine

use thiserror::Error;

/// Result type alias for Inkbridge operations
pub type Result<T> = std::result::Result<T, InkbridgeError>;

/// Main error type for the Inkbridge engine
#[derive(Error, Debug)]
pub enum InkbridgeError {
    /// The entry could not be fetched or has an unexpected shape
    #[error("Failed to load entry {entry_id}: {reason}")]
    LoadFailure { entry_id: String, reason: String },

    /// The host rejected an update because the entry changed underneath us
    #[error("Write conflict on entry {entry_id}: submitted version {submitted}, current version {current}")]
    WriteConflict {
        entry_id: String,
        submitted: u64,
        current: u64,
    },

    /// Converter output failed the round-trip check
    #[error("Conversion anomaly: {0}")]
    ConversionAnomaly(String),

    /// Any other failure reported by the host
    #[error("Host error: {0}")]
    Host(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Editor session errors
    #[error("Session error: {0}")]
    Session(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InkbridgeError {
    /// Create a new load failure
    pub fn load_failure<I: Into<String>, S: Into<String>>(entry_id: I, reason: S) -> Self {
        Self::LoadFailure {
            entry_id: entry_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new write conflict
    pub fn write_conflict<I: Into<String>>(entry_id: I, submitted: u64, current: u64) -> Self {
        Self::WriteConflict {
            entry_id: entry_id.into(),
            submitted,
            current,
        }
    }

    /// Create a new conversion anomaly
    pub fn conversion_anomaly<S: Into<String>>(msg: S) -> Self {
        Self::ConversionAnomaly(msg.into())
    }

    /// Create a new host error
    pub fn host<S: Into<String>>(msg: S) -> Self {
        Self::Host(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new session error
    pub fn session<S: Into<String>>(msg: S) -> Self {
        Self::Session(msg.into())
    }

    /// Check if the user can recover by continuing to edit
    pub fn is_recoverable(&self) -> bool {
        match self {
            InkbridgeError::LoadFailure { .. } => false,
            InkbridgeError::WriteConflict { .. } => true,
            InkbridgeError::ConversionAnomaly(_) => true,
            InkbridgeError::Host(_) => true,
            InkbridgeError::Config(_) => false,
            InkbridgeError::Session(_) => false,
            InkbridgeError::Io(_) => true,
            InkbridgeError::Json(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            InkbridgeError::LoadFailure { .. } => ErrorSeverity::Critical,
            InkbridgeError::WriteConflict { .. } => ErrorSeverity::High,
            InkbridgeError::ConversionAnomaly(_) => ErrorSeverity::Low,
            InkbridgeError::Host(_) => ErrorSeverity::High,
            InkbridgeError::Config(_) => ErrorSeverity::High,
            InkbridgeError::Session(_) => ErrorSeverity::Medium,
            InkbridgeError::Io(_) => ErrorSeverity::Medium,
            InkbridgeError::Json(_) => ErrorSeverity::Low,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_conflict_is_recoverable() {
        let error = InkbridgeError::write_conflict("entry-1", 3, 5);
        assert!(error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::High);
        assert_eq!(
            error.to_string(),
            "Write conflict on entry entry-1: submitted version 3, current version 5"
        );
    }

    #[test]
    fn test_load_failure_is_fatal() {
        let error = InkbridgeError::load_failure("entry-1", "body is not a string");
        assert!(!error.is_recoverable());
        assert_eq!(error.severity().to_string(), "CRITICAL");
    }
}
