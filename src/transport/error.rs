//! Transport layer error types.
//!
//! None of these cross the crate boundary as panics: they are returned,
//! logged, or turned into connection state changes.

use std::io;

use thiserror::Error;

use crate::core::CryptoError;

use super::ConnectionState;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Stream setup failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The connection cannot accept writes in its current state.
    /// Data is dropped; the orchestrator re-sends after reconnecting.
    #[error("connection not writable in state {0:?}")]
    NotWritable(ConnectionState),

    /// Inbound frame announced a length the protocol does not allow.
    #[error("invalid frame length {0}")]
    InvalidFrameLength(u32),

    /// Outbound payload cannot be framed in the current mode.
    #[error("payload of {0} bytes cannot be framed")]
    InvalidPayloadLength(usize),

    /// Datacenter has no address for the requested flags.
    #[error("no address available for datacenter {0}")]
    NoAddress(u32),

    /// Automatic reconnects exhausted.
    #[error("reconnect budget exhausted after {0} failures")]
    ReconnectBudgetExhausted(u32),
}

impl TransportError {
    /// Whether the byte stream can no longer be trusted.
    ///
    /// A desynchronized cipher stream cannot be repaired in place; the only
    /// recovery is a fresh attempt with fresh contexts.
    pub fn is_desync(&self) -> bool {
        matches!(self, TransportError::InvalidFrameLength(_))
    }

    /// Check if this error is fatal to the current attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_)
                | TransportError::InvalidFrameLength(_)
                | TransportError::ReconnectBudgetExhausted(_)
        )
    }

    /// Check if the error only drops data, leaving the connection usable.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            TransportError::NotWritable(_) | TransportError::InvalidPayloadLength(_)
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desync_errors() {
        assert!(TransportError::InvalidFrameLength(3).is_desync());
        assert!(!TransportError::NotWritable(ConnectionState::Idle).is_desync());
        assert!(!TransportError::Io(io::Error::other("test")).is_desync());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(TransportError::InvalidFrameLength(3).is_fatal());
        assert!(TransportError::ReconnectBudgetExhausted(5).is_fatal());
        assert!(TransportError::Io(io::Error::other("test")).is_fatal());

        assert!(!TransportError::NotWritable(ConnectionState::Suspended).is_fatal());
        assert!(!TransportError::InvalidPayloadLength(3).is_fatal());
    }

    #[test]
    fn test_silent_drop_errors() {
        assert!(TransportError::NotWritable(ConnectionState::Reconnecting).is_silent_drop());
        assert!(TransportError::InvalidPayloadLength(7).is_silent_drop());
        assert!(!TransportError::ReconnectBudgetExhausted(1).is_silent_drop());
    }
}
