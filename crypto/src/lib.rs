//! Cryptographic primitives for the Rollcall pipeline.
//!
//! Two concerns only: encrypting biometric templates at rest with a
//! process-wide symmetric key, and minting unguessable single-use voucher
//! tokens. Everything else (passwords, transport security) belongs to the
//! surrounding application.

pub mod cipher;
pub mod error;
pub mod token;

pub use cipher::TemplateCipher;
pub use error::CryptoError;
pub use token::mint_token;
