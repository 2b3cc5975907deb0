//! Voucher token minting.

use crate::error::CryptoError;

/// Random bytes per token. 32 bytes of OS entropy make guessing a live
/// token computationally out of reach.
pub const TOKEN_BYTES: usize = 32;

/// Mint an opaque voucher token: 32 random bytes, hex-encoded into 64
/// URL-safe characters. The token doubles as the voucher's lookup key.
pub fn mint_token() -> Result<String, CryptoError> {
    let mut buf = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut buf).map_err(|_| CryptoError::EntropyUnavailable)?;
    Ok(hex::encode(buf))
}
