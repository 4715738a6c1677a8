//! Error handling module for plandeploy
//!
//! Provides the crate-wide error type built with thiserror. Module-specific
//! errors (store, manifest) convert into it so callers can use `?`
//! across module boundaries.

use thiserror::Error;

/// Main error type for plandeploy
#[derive(Error, Debug)]
pub enum DeployError {
    /// IO errors (writing config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plan manifest errors
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Plan catalog errors (unknown records, protected deletes)
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for plandeploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeployError::config("cancel_ttl_secs must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: cancel_ttl_secs must be positive"
        );

        let err: DeployError = crate::store::StoreError::PlanNotFound(crate::models::PlanId(3)).into();
        assert!(err.to_string().starts_with("Store error: "));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DeployError = io_err.into();
        assert!(matches!(err, DeployError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: DeployError = json_err.into();
        assert!(matches!(err, DeployError::Json(_)));
    }
}
