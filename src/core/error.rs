//! Error types shared across layers.

use thiserror::Error;

/// Errors in the obfuscation layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Configured secret cannot key the stream.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),
}

/// Errors raised while assembling components.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required collaborator was not supplied.
    #[error("missing {0}")]
    Missing(&'static str),

    /// A parameter is out of range.
    #[error("invalid {name}: {reason}")]
    Invalid {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Top-level errors.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
