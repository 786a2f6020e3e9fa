//! Pipeline error types
//!
//! Every call that leaves the process returns [`PipelineError`]. Stages turn
//! an `Err` into an `error_condition` on the row; only configuration and
//! database failures surface to the caller.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}")]
    HttpStatus { service: &'static str, status: u16 },

    #[error("Transmission RPC error: {0}")]
    Rpc(String),

    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Feed parse error: {0}")]
    Feed(#[from] quick_xml::DeError),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] at_common::AtError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a transfer error
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer(message.into())
    }

    /// Create a not found error with resource context
    pub fn not_found(resource_type: &str, identifier: &str) -> Self {
        Self::NotFound(format!("{} '{}' not found", resource_type, identifier))
    }

    /// Map a non-success response to `HttpStatus`
    pub fn check_status(
        service: &'static str,
        response: reqwest::Response,
    ) -> PipelineResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Self::HttpStatus {
                service,
                status: status.as_u16(),
            })
        }
    }

    /// Fatal errors abort a stage instead of being annotated on a row
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Database(_) | Self::Migration(_) | Self::Yaml(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message() {
        let err = PipelineError::HttpStatus {
            service: "tmdb",
            status: 503,
        };
        assert_eq!(err.to_string(), "tmdb returned HTTP 503");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_config_is_fatal() {
        assert!(PipelineError::config("BATCH_SIZE must be positive").is_fatal());
        assert!(!PipelineError::transfer("copy failed").is_fatal());
    }
}
