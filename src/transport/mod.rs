//! Transport layer: the reconnecting connection and its pacing.
//!
//! - **Connection state machine**: [`Connection`], [`ConnectionState`] and the
//!   [`ConnectionEvent`] queue the orchestrator drains
//! - **Framing**: [`encode_frame`] and the reassembling [`FrameDecoder`]
//! - **Backoff**: [`ExponentialBackoffStrategy`] with a [`JitterSource`]
//! - **Reactor seam**: [`EventObject`] routing readiness and timer events
//! - **Timer adapter**: [`TokioTimer`] (feature `tokio`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Orchestrator (requests, sessions)   │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   state machine, framing, backoff       │
//! ├─────────────────────────────────────────┤
//! │         Obfuscation (crypto)            │
//! ├─────────────────────────────────────────┤
//! │         Socket / Timer (traits)         │
//! └─────────────────────────────────────────┘
//! ```

mod backoff;
mod config;
mod connection;
mod error;
mod event;
mod framing;
#[cfg(feature = "tokio")]
mod timer;

pub use backoff::{BackoffConfig, ExponentialBackoffStrategy, JitterSource};
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::*;
pub use error::*;
pub use event::*;
pub use framing::{FrameDecoder, InboundItem, encode_frame};
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub use timer::TokioTimer;
