//! Refresh-secret generation and hashing via bcrypt.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

use super::CodecError;

/// Default bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Cheapest cost bcrypt accepts.
#[cfg(test)]
pub(crate) const TEST_COST: u32 = 4;

/// Raw refresh secrets carry 32 random bytes.
const REFRESH_SECRET_BYTES: usize = 32;

/// Generate a cryptographically random refresh secret (32 bytes, base64).
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Hash a raw secret with bcrypt (salted, deliberately slow).
pub fn hash_secret(raw: &str, cost: u32) -> Result<String, CodecError> {
    bcrypt::hash(raw, cost).map_err(|e| CodecError::Hash(format!("bcrypt hash: {e}")))
}

/// Check a raw secret against a bcrypt hash. A malformed hash counts as a
/// mismatch.
pub fn verify_secret(raw: &str, hash: &str) -> bool {
    bcrypt::verify(raw, hash).unwrap_or(false)
}
