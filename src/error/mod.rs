//! Error handling for network selection
//!
//! This module provides the error type returned by every resolver, provider
//! and process-lookup operation.

use std::fmt;

/// Result type alias for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Error types for network selection and connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// A choice could not be mapped to a known ecosystem, network, provider or process
    Resolution(String),
    /// A choice string is malformed
    InvalidChoice(String),
    /// Configuration errors
    Config(String),
    /// Provider-level failures (connect, disconnect, bad settings)
    Provider(String),
    /// Transport errors while talking to a node
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Resolution(msg) => write!(f, "Resolution error: {msg}"),
            NetworkError::InvalidChoice(msg) => write!(f, "Invalid network choice: {msg}"),
            NetworkError::Config(msg) => write!(f, "Configuration error: {msg}"),
            NetworkError::Provider(msg) => write!(f, "Provider error: {msg}"),
            NetworkError::Network(msg) => write!(f, "Network error: {msg}"),
            NetworkError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            NetworkError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl NetworkError {
    /// True for failures to map a choice onto something known
    pub fn is_resolution(&self) -> bool {
        matches!(self, NetworkError::Resolution(_))
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for NetworkError {
    fn from(err: toml::de::Error) -> Self {
        NetworkError::Config(err.to_string())
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        NetworkError::InvalidChoice(err.to_string())
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        NetworkError::Network(err.to_string())
    }
}
