use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key must be {expected} bytes, got {actual}")]
    BadKeyLength { expected: usize, actual: usize },

    #[error("encryption key is not valid hex: {0}")]
    BadKeyEncoding(String),

    #[error("template encryption failed")]
    Encrypt,

    #[error("template decryption failed: authentication check failed")]
    Decrypt,

    #[error("ciphertext too short to carry a nonce")]
    TruncatedCiphertext,

    #[error("decrypted payload length {0} is not a whole number of f32 lanes")]
    MalformedVector(usize),

    #[error("operating system entropy source unavailable")]
    EntropyUnavailable,
}
