//! Error types for applink.

use thiserror::Error;

/// Primary error type for all device-link operations.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    ServerRejected(String),

    #[error("Unable to fetch device token.")]
    EmptyToken,

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Profile download failed: {0}")]
    Download(String),

    #[error("No provisioning callback received within {0}ms")]
    Timeout(u64),

    #[error("Local callback port {0} is already in use")]
    PortUnavailable(u16),

    #[error("Profile installation failed: {0}")]
    ProfileInstall(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Link workflow cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for LinkError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for LinkError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for LinkError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, LinkError>;
