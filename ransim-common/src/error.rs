//! Error types for ransim

use thiserror::Error;

/// Error types shared across the ransim crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol-related errors.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network I/O errors.
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// PDU constraint validation errors.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Codec errors (encode/decode of protocol PDUs).
    #[error("Codec error: {0}")]
    Codec(String),

    /// State machine errors.
    #[error("State machine error: {0}")]
    StateMachine(String),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
