use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};

use super::TokenError;

/// Number of random bytes in a generated token (128 bits).
pub const TOKEN_BYTES: usize = 16;

/// Produces ownership tokens for lock acquisitions.
pub type TokenGenerator = Arc<dyn Fn() -> Result<String, TokenError> + Send + Sync>;

/// Generate a random ownership token from the OS randomness source,
/// encoded as standard base64.
pub fn random_token() -> Result<String, TokenError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError(e.to_string()))?;
    Ok(STANDARD.encode(bytes))
}
