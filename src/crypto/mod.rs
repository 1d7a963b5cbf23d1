//! Transport obfuscation layer.
//!
//! Scrambles the byte stream so the protocol cannot be fingerprinted on the
//! wire. This is not payload encryption: message confidentiality is the job
//! of the layer above.
//!
//! - [`CtrContext`]: AES-256 counter-mode stream context
//! - [`ObfuscationMode`]: framing/obfuscation scheme selection
//! - [`Preamble`] / [`ObfuscatedStream`]: per-attempt key setup

mod ctr;
mod obfuscation;

pub use ctr::CtrContext;
pub use obfuscation::{
    ObfuscatedStream, ObfuscationMode, Preamble, Secret, SecretKind, encrypt_key_with_secret,
};
