//! AES-256 counter-mode stream context.
//!
//! Each context carries:
//! - the expanded 256-bit key,
//! - the running 128-bit counter block (big-endian, incremented per block),
//! - the current 128-bit keystream block,
//! - the byte offset (0-15) into that keystream block.
//!
//! The offset and the counter move together: a fresh keystream block is
//! produced exactly when the offset wraps to zero. Resetting one without the
//! other desynchronizes the stream for good, so neither is exposed mutably.

use std::fmt;

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use zeroize::Zeroize;

use crate::core::{CIPHER_BLOCK_SIZE, CIPHER_KEY_SIZE, CryptoError};

/// One direction of an obfuscated byte stream.
pub struct CtrContext {
    /// Expanded key schedule.
    cipher: Aes256,
    /// Running counter block.
    counter: [u8; CIPHER_BLOCK_SIZE],
    /// Keystream block for the current counter value.
    keystream: [u8; CIPHER_BLOCK_SIZE],
    /// Next unused byte of `keystream`.
    offset: usize,
    /// Total bytes processed.
    processed: u64,
}

impl CtrContext {
    /// Create a context from a 32-byte key and a 16-byte initial counter.
    pub fn new(key: &[u8; CIPHER_KEY_SIZE], iv: &[u8; CIPHER_BLOCK_SIZE]) -> Self {
        Self {
            cipher: Aes256::new(GenericArray::from_slice(key)),
            counter: *iv,
            keystream: [0; CIPHER_BLOCK_SIZE],
            offset: 0,
            processed: 0,
        }
    }

    /// Create a context from slices, validating their lengths.
    pub fn from_slices(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let key: &[u8; CIPHER_KEY_SIZE] =
            key.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: CIPHER_KEY_SIZE,
                actual: key.len(),
            })?;
        let iv: &[u8; CIPHER_BLOCK_SIZE] =
            iv.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: CIPHER_BLOCK_SIZE,
                actual: iv.len(),
            })?;
        Ok(Self::new(key, iv))
    }

    /// XOR `data` in place with the next `data.len()` keystream bytes.
    ///
    /// Encryption and decryption are the same operation.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            if self.offset == 0 {
                self.refill();
            }
            *byte ^= self.keystream[self.offset];
            self.offset = (self.offset + 1) % CIPHER_BLOCK_SIZE;
        }
        self.processed += data.len() as u64;
    }

    /// Copying variant of [`apply_keystream`](Self::apply_keystream).
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply_keystream(&mut out);
        out
    }

    /// Current offset into the keystream block.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Current counter block.
    pub fn counter(&self) -> &[u8; CIPHER_BLOCK_SIZE] {
        &self.counter
    }

    /// Total bytes run through this context.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Encrypt the counter into the keystream block, then bump the counter.
    fn refill(&mut self) {
        let mut block = aes::Block::clone_from_slice(&self.counter);
        self.cipher.encrypt_block(&mut block);
        self.keystream.copy_from_slice(&block);
        increment_be(&mut self.counter);
    }
}

impl fmt::Debug for CtrContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtrContext")
            .field("offset", &self.offset)
            .field("processed", &self.processed)
            .finish_non_exhaustive()
    }
}

impl Drop for CtrContext {
    fn drop(&mut self) {
        self.counter.zeroize();
        self.keystream.zeroize();
    }
}

/// Increment a big-endian 128-bit counter, wrapping on overflow.
fn increment_be(counter: &mut [u8; CIPHER_BLOCK_SIZE]) {
    for byte in counter.iter_mut().rev() {
        let (next, carry) = byte.overflowing_add(1);
        *byte = next;
        if !carry {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SP 800-38A, F.5.5 CTR-AES256.Encrypt
    const NIST_KEY: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
    const NIST_IV: &str = "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff";
    const NIST_PLAIN: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";
    const NIST_CIPHER: &str = "601ec313775789a5b7a7f504bbf3d228f443e3ca4d62b59aca84e990cacaf5c5";

    fn nist_context() -> CtrContext {
        let key = hex::decode(NIST_KEY).unwrap();
        let iv = hex::decode(NIST_IV).unwrap();
        CtrContext::from_slices(&key, &iv).unwrap()
    }

    #[test]
    fn test_nist_vector() {
        let mut ctx = nist_context();
        let out = ctx.process(&hex::decode(NIST_PLAIN).unwrap());
        assert_eq!(hex::encode(out), NIST_CIPHER);
        assert_eq!(ctx.offset(), 0);
        assert_eq!(ctx.processed(), 32);
    }

    #[test]
    fn test_chunked_matches_one_shot() {
        let plain = hex::decode(NIST_PLAIN).unwrap();

        let mut whole = nist_context();
        let expected = whole.process(&plain);

        // Odd chunk sizes straddle block boundaries
        let mut chunked = nist_context();
        let mut out = Vec::new();
        for chunk in plain.chunks(7) {
            out.extend(chunked.process(chunk));
        }

        assert_eq!(out, expected);
        assert_eq!(chunked.offset(), whole.offset());
        assert_eq!(chunked.counter(), whole.counter());
    }

    #[test]
    fn test_offset_and_counter_advance_together() {
        let mut ctx = nist_context();
        let start = *ctx.counter();

        ctx.apply_keystream(&mut [0u8; 5]);
        assert_eq!(ctx.offset(), 5);
        // First block consumed one counter value
        assert_ne!(ctx.counter(), &start);
        let after_first = *ctx.counter();

        ctx.apply_keystream(&mut [0u8; 11]);
        assert_eq!(ctx.offset(), 0);
        assert_eq!(ctx.counter(), &after_first);

        ctx.apply_keystream(&mut [0u8; 1]);
        assert_eq!(ctx.offset(), 1);
        assert_ne!(ctx.counter(), &after_first);
    }

    #[test]
    fn test_roundtrip() {
        let key = [7u8; CIPHER_KEY_SIZE];
        let iv = [9u8; CIPHER_BLOCK_SIZE];
        let mut enc = CtrContext::new(&key, &iv);
        let mut dec = CtrContext::new(&key, &iv);

        let data = b"obfuscated stream bytes".to_vec();
        let scrambled = enc.process(&data);
        assert_ne!(scrambled, data);
        assert_eq!(dec.process(&scrambled), data);
    }

    #[test]
    fn test_counter_wraps() {
        let mut counter = [0xff; CIPHER_BLOCK_SIZE];
        increment_be(&mut counter);
        assert_eq!(counter, [0; CIPHER_BLOCK_SIZE]);

        let mut counter = [0; CIPHER_BLOCK_SIZE];
        counter[15] = 0xff;
        increment_be(&mut counter);
        assert_eq!(counter[14], 1);
        assert_eq!(counter[15], 0);
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let err = CtrContext::from_slices(&[0u8; 16], &[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        );
        assert!(CtrContext::from_slices(&[0u8; 32], &[0u8; 8]).is_err());
    }
}
