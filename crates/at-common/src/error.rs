//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, AtError>;

/// Main error type for shared types and utilities
#[derive(Error, Debug)]
pub enum AtError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid info-hash '{0}': expected 40 hexadecimal characters")]
    InvalidHash(String),

    #[error("Invalid {kind} value: '{value}'")]
    InvalidEnum { kind: &'static str, value: String },

    #[error("Illegal status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl AtError {
    /// Create an invalid enum error
    pub fn invalid_enum(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidEnum {
            kind,
            value: value.into(),
        }
    }
}
