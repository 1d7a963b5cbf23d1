//! Outstanding-request tracking.
//!
//! - [`Request`]: retry budget, message-id correlation and callbacks of one
//!   remote call
//! - [`ManagedRef`]: release-once guard for host-runtime references

mod managed;
mod request;

pub use managed::ManagedRef;
pub use request::{OnCompleteFn, OnQuickAckFn, OnWriteToSocketFn, Request, RpcError};
