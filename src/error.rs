//! Error types for the spotter gateway

use thiserror::Error;

/// Result type alias for spotter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the spotter gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required device capability is absent (no speech input, no camera)
    #[error("capability missing: {0}")]
    Capability(String),

    /// Frame capture error
    #[error("capture error: {0}")]
    Capture(String),

    /// Detection service error
    #[error("detector error: {0}")]
    Detector(String),

    /// Audio feedback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Socket protocol violation (bad or missing session/role)
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// An operation is not valid in the current scan state
    #[error("invalid state: {0}")]
    State(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
