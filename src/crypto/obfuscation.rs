//! Transport obfuscation: protocol selection, preamble and stream keys.
//!
//! Every obfuscated attempt opens with a 64-byte preamble:
//!
//! ```text
//!  0        8                        40              56      60    62    64
//!  +--------+------------------------+---------------+-------+-----+-----+
//!  | random |  encrypt key (32)      | encrypt iv(16)|  tag  | dc  | rnd |
//!  +--------+------------------------+---------------+-------+-----+-----+
//!                                                    |<-- sent encrypted -->|
//! ```
//!
//! The decrypt direction uses bytes 8..56 reversed. When a secret is
//! configured, each 32-byte key is replaced by `SHA-256(key || secret)`.
//! Bytes 0..56 travel in the clear; bytes 56..64 are replaced by their
//! encrypted form so the tag and datacenter id are only visible to a peer
//! that derived the same keys.

use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::core::{
    CIPHER_BLOCK_SIZE, CIPHER_KEY_SIZE, CryptoError, FORBIDDEN_PREAMBLE_WORDS, PREAMBLE_DC_OFFSET,
    PREAMBLE_KEY_MATERIAL_SIZE, PREAMBLE_KEY_OFFSET, PREAMBLE_SIZE, PREAMBLE_TAG_OFFSET,
    SECRET_KEY_SIZE, SECRET_PREFIX_PADDED, SECRET_PREFIX_TLS, TAG_ABRIDGED, TAG_INTERMEDIATE,
    TAG_PADDED_INTERMEDIATE,
};

use super::CtrContext;

/// Framing/obfuscation scheme of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObfuscationMode {
    /// Abridged framing (`ef`): 1 or 4 byte length in 4-byte units.
    Abridged,
    /// Intermediate framing (`ee`): 4-byte length.
    Intermediate,
    /// Padded intermediate framing (`dd`): 4-byte length, random padding.
    PaddedIntermediate,
    /// Intermediate framing over a transport that encrypts by itself.
    Tls,
}

impl ObfuscationMode {
    /// Tag byte repeated in the preamble, `None` when no preamble is sent.
    pub fn preamble_tag(self) -> Option<u8> {
        match self {
            Self::Abridged => Some(TAG_ABRIDGED),
            Self::Intermediate => Some(TAG_INTERMEDIATE),
            Self::PaddedIntermediate => Some(TAG_PADDED_INTERMEDIATE),
            Self::Tls => None,
        }
    }

    /// Whether the byte stream is scrambled with the stream contexts.
    pub fn is_obfuscated(self) -> bool {
        self != Self::Tls
    }

    /// Select the mode for an attempt from the active secret.
    pub fn select(secret: Option<&Secret>, prefer_abridged: bool) -> Self {
        match secret.map(Secret::kind) {
            Some(SecretKind::Padded) => Self::PaddedIntermediate,
            Some(SecretKind::Tls) => Self::Tls,
            Some(SecretKind::Plain) | None if prefer_abridged => Self::Abridged,
            Some(SecretKind::Plain) | None => Self::Intermediate,
        }
    }
}

/// How a secret was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Bare 16-byte secret.
    Plain,
    /// `0xdd`-prefixed secret: padded framing.
    Padded,
    /// `0xee`-prefixed secret: TLS mode (trailing domain is ignored here).
    Tls,
}

/// A parsed obfuscation secret.
#[derive(Clone)]
pub struct Secret {
    kind: SecretKind,
    key: [u8; SECRET_KEY_SIZE],
}

impl Secret {
    /// Parse raw secret bytes as published by the datacenter or proxy.
    pub fn parse(bytes: &[u8]) -> Result<Self, CryptoError> {
        let (kind, key) = match bytes {
            [prefix, rest @ ..]
                if rest.len() >= SECRET_KEY_SIZE && *prefix == SECRET_PREFIX_PADDED =>
            {
                (SecretKind::Padded, &rest[..SECRET_KEY_SIZE])
            }
            [prefix, rest @ ..]
                if rest.len() >= SECRET_KEY_SIZE && *prefix == SECRET_PREFIX_TLS =>
            {
                (SecretKind::Tls, &rest[..SECRET_KEY_SIZE])
            }
            _ if bytes.len() == SECRET_KEY_SIZE => (SecretKind::Plain, bytes),
            _ => {
                return Err(CryptoError::InvalidSecret(format!(
                    "unsupported secret of {} bytes",
                    bytes.len()
                )));
            }
        };
        let mut out = [0u8; SECRET_KEY_SIZE];
        out.copy_from_slice(key);
        Ok(Self { kind, key: out })
    }

    /// How the secret was published.
    pub fn kind(&self) -> SecretKind {
        self.kind
    }

    /// The 16 bytes mixed into the stream keys.
    pub fn key(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Replace the 32-byte key at the front of `material` with
/// `SHA-256(key || secret)` when a secret is configured.
pub fn encrypt_key_with_secret(
    material: &mut [u8; PREAMBLE_KEY_MATERIAL_SIZE],
    secret: Option<&Secret>,
) {
    let Some(secret) = secret else {
        return;
    };
    let mut hasher = Sha256::new();
    hasher.update(&material[..CIPHER_KEY_SIZE]);
    hasher.update(secret.key());
    material[..CIPHER_KEY_SIZE].copy_from_slice(&hasher.finalize());
}

/// The 64-byte preamble of an obfuscated attempt, in plaintext.
#[derive(Clone)]
pub struct Preamble([u8; PREAMBLE_SIZE]);

impl Preamble {
    /// Draw a fresh preamble carrying `tag` and the datacenter id.
    ///
    /// Candidates that could be mistaken for another protocol are redrawn.
    pub fn generate<R: RngCore + ?Sized>(rng: &mut R, tag: u8, dc_id: i16) -> Self {
        let mut bytes = [0u8; PREAMBLE_SIZE];
        loop {
            rng.fill_bytes(&mut bytes);
            if is_acceptable(&bytes) {
                break;
            }
        }
        bytes[PREAMBLE_TAG_OFFSET..PREAMBLE_DC_OFFSET].fill(tag);
        bytes[PREAMBLE_DC_OFFSET..PREAMBLE_DC_OFFSET + 2].copy_from_slice(&dc_id.to_le_bytes());
        Self(bytes)
    }

    /// Wrap existing plaintext preamble bytes.
    pub fn from_bytes(bytes: [u8; PREAMBLE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Plaintext bytes.
    pub fn as_bytes(&self) -> &[u8; PREAMBLE_SIZE] {
        &self.0
    }

    /// Tag byte carried by this preamble.
    pub fn tag(&self) -> u8 {
        self.0[PREAMBLE_TAG_OFFSET]
    }

    /// Datacenter id carried by this preamble.
    pub fn dc_id(&self) -> i16 {
        i16::from_le_bytes([self.0[PREAMBLE_DC_OFFSET], self.0[PREAMBLE_DC_OFFSET + 1]])
    }

    /// Key material for the sending direction of the initiator.
    fn forward_material(&self) -> [u8; PREAMBLE_KEY_MATERIAL_SIZE] {
        let mut material = [0u8; PREAMBLE_KEY_MATERIAL_SIZE];
        material.copy_from_slice(
            &self.0[PREAMBLE_KEY_OFFSET..PREAMBLE_KEY_OFFSET + PREAMBLE_KEY_MATERIAL_SIZE],
        );
        material
    }

    /// Key material for the receiving direction of the initiator.
    fn reverse_material(&self) -> [u8; PREAMBLE_KEY_MATERIAL_SIZE] {
        let mut material = self.forward_material();
        material.reverse();
        material
    }
}

impl Drop for Preamble {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Whether a random draw is usable as a preamble.
fn is_acceptable(bytes: &[u8; PREAMBLE_SIZE]) -> bool {
    let first = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let second = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    bytes[0] != TAG_ABRIDGED && second != 0 && !FORBIDDEN_PREAMBLE_WORDS.contains(&first)
}

/// Build a stream context from 48 bytes of key material.
fn context_from(
    mut material: [u8; PREAMBLE_KEY_MATERIAL_SIZE],
    secret: Option<&Secret>,
) -> CtrContext {
    encrypt_key_with_secret(&mut material, secret);
    let mut key = [0u8; CIPHER_KEY_SIZE];
    let mut iv = [0u8; CIPHER_BLOCK_SIZE];
    key.copy_from_slice(&material[..CIPHER_KEY_SIZE]);
    iv.copy_from_slice(&material[CIPHER_KEY_SIZE..]);
    let ctx = CtrContext::new(&key, &iv);
    key.zeroize();
    iv.zeroize();
    material.zeroize();
    ctx
}

/// Paired stream contexts for one obfuscated attempt.
#[derive(Debug)]
pub struct ObfuscatedStream {
    encrypt: CtrContext,
    decrypt: CtrContext,
}

impl ObfuscatedStream {
    /// Initiator side: derive both contexts from `preamble` and return the
    /// bytes to put on the wire first.
    ///
    /// The encrypt context has consumed the 64 preamble bytes afterwards.
    pub fn initiate(preamble: &Preamble, secret: Option<&Secret>) -> (Self, [u8; PREAMBLE_SIZE]) {
        let mut stream = Self {
            encrypt: context_from(preamble.forward_material(), secret),
            decrypt: context_from(preamble.reverse_material(), secret),
        };
        let sealed = stream.encrypt.process(preamble.as_bytes());
        let mut wire = *preamble.as_bytes();
        wire[PREAMBLE_TAG_OFFSET..].copy_from_slice(&sealed[PREAMBLE_TAG_OFFSET..]);
        (stream, wire)
    }

    /// Responder side: derive the mirrored contexts from the wire preamble.
    ///
    /// Returns the stream and the recovered plaintext preamble; the decrypt
    /// context has consumed the 64 preamble bytes afterwards.
    pub fn accept(wire: &[u8; PREAMBLE_SIZE], secret: Option<&Secret>) -> (Self, Preamble) {
        let clear = Preamble::from_bytes(*wire);
        let mut stream = Self {
            encrypt: context_from(clear.reverse_material(), secret),
            decrypt: context_from(clear.forward_material(), secret),
        };
        let opened = stream.decrypt.process(wire);
        let mut plain = *wire;
        plain[PREAMBLE_TAG_OFFSET..].copy_from_slice(&opened[PREAMBLE_TAG_OFFSET..]);
        (stream, Preamble::from_bytes(plain))
    }

    /// Scramble outbound bytes in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.encrypt.apply_keystream(data);
    }

    /// Unscramble inbound bytes in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.decrypt.apply_keystream(data);
    }

    /// Outbound context.
    pub fn encrypt_context(&self) -> &CtrContext {
        &self.encrypt
    }

    /// Inbound context.
    pub fn decrypt_context(&self) -> &CtrContext {
        &self.decrypt
    }
}
