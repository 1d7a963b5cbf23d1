//! # tether
//!
//! Transport core of a mobile RPC client: an obfuscated, reconnecting
//! connection to a datacenter, plus the bookkeeping for calls in flight.
//!
//! - **Obfuscation**: per-attempt 64-byte preamble keying paired AES-256-CTR
//!   stream contexts, with abridged, intermediate, padded and TLS framings
//! - **Reconnects**: exponential backoff with jitter, a bounded retry budget
//!   and address/port rotation after silent failures
//! - **Requests**: retry budgets, message-id correlation and callbacks that
//!   fire at most once
//!
//! The crate does no I/O of its own. Sockets, timers, datacenter
//! configuration and the orchestrator are supplied through the traits in
//! [`core`]; the connection is driven by callbacks and reports back through a
//! queue of [`ConnectionEvent`]s.
//!
//! ## Feature Flags
//!
//! - `tokio` (default): [`transport::TokioTimer`], a `Timer` backed by tokio
//!
//! ## Modules
//!
//! - [`core`]: constants, flag types, errors and collaborator traits
//! - [`crypto`]: counter-mode contexts, secrets and preambles
//! - [`transport`]: connection state machine, framing, backoff, event routing
//! - [`rpc`]: outstanding requests
//!
//! ## Example Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use std::time::Duration;
//! use tether::prelude::*;
//!
//! struct Net;
//! impl Socket for Net {
//!     fn open(&mut self, _: &str, _: u16, _: AddressFlags) -> std::io::Result<()> { Ok(()) }
//!     fn write(&mut self, _: &[u8]) -> std::io::Result<()> { Ok(()) }
//!     fn close(&mut self) {}
//! }
//!
//! struct NoTimer;
//! impl Timer for NoTimer {
//!     fn arm(&mut self, _: Duration, _: TimerToken) {}
//!     fn cancel(&mut self) {}
//! }
//!
//! struct Dc;
//! impl Datacenter for Dc {
//!     fn id(&self) -> u32 { 2 }
//!     fn current_address(&self, _: AddressFlags) -> Option<String> { Some("10.0.0.1".into()) }
//!     fn current_port(&self, _: AddressFlags) -> u16 { 443 }
//!     fn next_address_or_port(&self, _: AddressFlags) {}
//!     fn secret(&self, _: SecretType) -> Option<Vec<u8>> { None }
//!     fn has_media_address(&self) -> bool { false }
//!     fn last_init_version(&self) -> u32 { 0 }
//!     fn last_init_media_version(&self) -> u32 { 0 }
//! }
//!
//! struct Orchestrator;
//! impl ConnectionDelegate for Orchestrator {
//!     fn has_pending_requests(&self, _: ConnectionType) -> bool { true }
//! }
//!
//! let mut conn = Connection::builder(ConnectionType::Generic, 0)
//!     .datacenter(Rc::new(Dc))
//!     .socket(Box::new(Net))
//!     .timer(Box::new(NoTimer))
//!     .delegate(Rc::new(Orchestrator))
//!     .build()
//!     .unwrap();
//!
//! conn.connect();
//! conn.on_connected();
//! conn.send_data(&[0u8; 16], true, true).unwrap();
//! assert!(matches!(conn.poll_event(), Some(ConnectionEvent::Connected { .. })));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod crypto;
pub mod rpc;
pub mod transport;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::crypto::{ObfuscationMode, Secret, SecretKind};

    pub use crate::rpc::{ManagedRef, Request, RpcError};

    pub use crate::transport::{
        BackoffConfig, Connection, ConnectionBuilder, ConnectionConfig, ConnectionEvent,
        ConnectionState, EventMask, EventObject, EventTarget, ExponentialBackoffStrategy,
        JitterSource, TransportError, TransportResult,
    };

    #[cfg(feature = "tokio")]
    pub use crate::transport::TokioTimer;
}

// Re-export commonly used items at crate root
pub use core::{ConfigError, CryptoError, TetherError};
pub use rpc::{Request, RpcError};
pub use transport::{Connection, ConnectionEvent, ConnectionState, TransportError};
