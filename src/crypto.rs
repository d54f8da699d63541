//! AES-128 in ECB mode with zero padding, as spoken by the device firmware.
//!
//! Keys are the 16 ASCII characters the device hands out during binding, or the
//! vendor default key before binding.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use thiserror::Error;

/// Key published by the vendor, used for scan and bind traffic.
pub const DEFAULT_KEY: &str = "a3K8Bx%2r8Y7#xDh";

pub const BLOCK_SIZE: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key must be 16 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("ciphertext length {0} is not a multiple of the block size")]
    InvalidCiphertextLength(usize),
    #[error("ciphertext is not valid base64: {0}")]
    InvalidEncoding(String),
}

/// Block cipher keyed with a device key.
#[derive(Clone)]
pub struct EcbCipher {
    cipher: Aes128,
}

impl std::fmt::Debug for EcbCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcbCipher").finish_non_exhaustive()
    }
}

impl EcbCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher =
            Aes128::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    pub fn default_key() -> Self {
        // DEFAULT_KEY is exactly one block long.
        Self {
            cipher: Aes128::new(GenericArray::from_slice(DEFAULT_KEY.as_bytes())),
        }
    }

    /// Zero-pads `plaintext` up to the block boundary and encrypts each block.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let padded_len = plaintext.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        let mut buf = plaintext.to_vec();
        buf.resize(padded_len, 0);
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        buf
    }

    /// Decrypts block by block and strips the trailing zero padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
        }
        let mut buf = ciphertext.to_vec();
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        let end = buf.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        buf.truncate(end);
        Ok(buf)
    }
}
