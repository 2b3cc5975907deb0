//! Biometric template encryption.
//!
//! Templates are encrypted at rest with ChaCha20-Poly1305 under a single
//! process-wide key. The same key encrypts many templates over its
//! lifetime, so every encryption draws a fresh random nonce; the nonce is
//! prepended to the ciphertext (nonce || ciphertext || tag).

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

pub const KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 12;

/// Symmetric cipher for biometric templates, keyed by a process-wide secret.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TemplateCipher {
    key: [u8; KEY_BYTES],
}

impl TemplateCipher {
    pub fn new(key: [u8; KEY_BYTES]) -> Self {
        Self { key }
    }

    /// Build from a hex-encoded key, as carried in the pipeline config.
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key).map_err(|e| CryptoError::BadKeyEncoding(e.to_string()))?;
        let key: [u8; KEY_BYTES] =
            bytes
                .try_into()
                .map_err(|v: Vec<u8>| CryptoError::BadKeyLength {
                    expected: KEY_BYTES,
                    actual: v.len(),
                })?;
        Ok(Self::new(key))
    }

    /// Encrypt an embedding vector. Output layout: nonce || AEAD ciphertext.
    pub fn encrypt_vector(&self, vector: &[f32]) -> Result<Vec<u8>, CryptoError> {
        let mut plaintext = Vec::with_capacity(vector.len() * 4);
        for lane in vector {
            plaintext.extend_from_slice(&lane.to_le_bytes());
        }

        let mut nonce_bytes = [0u8; NONCE_BYTES];
        getrandom::getrandom(&mut nonce_bytes).map_err(|_| CryptoError::EntropyUnavailable)?;
        let nonce = Nonce::from(nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&self.key).expect("key length is fixed");
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a template payload produced by [`encrypt_vector`].
    ///
    /// [`encrypt_vector`]: TemplateCipher::encrypt_vector
    pub fn decrypt_vector(&self, payload: &[u8]) -> Result<Vec<f32>, CryptoError> {
        if payload.len() < NONCE_BYTES {
            return Err(CryptoError::TruncatedCiphertext);
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_BYTES);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&self.key).expect("key length is fixed");
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        if plaintext.len() % 4 != 0 {
            return Err(CryptoError::MalformedVector(plaintext.len()));
        }
        Ok(plaintext
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
