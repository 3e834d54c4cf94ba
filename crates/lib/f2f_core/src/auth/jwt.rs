//! JWT access token signing and verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::CodecError;
use crate::models::auth::AccessClaims;

/// Minimum accepted HMAC key length in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Reject absent or short signing keys.
pub fn ensure_signing_key(secret: &[u8]) -> Result<(), CodecError> {
    if secret.is_empty() {
        return Err(CodecError::Config("JWT_SECRET is not set".into()));
    }
    if secret.len() < MIN_SIGNING_KEY_LEN {
        return Err(CodecError::Config(format!(
            "JWT_SECRET must be at least {MIN_SIGNING_KEY_LEN} bytes, got {}",
            secret.len()
        )));
    }
    Ok(())
}

/// Sign access token claims (HS256).
pub fn sign_access_token(claims: &AccessClaims, secret: &[u8]) -> Result<String, CodecError> {
    ensure_signing_key(secret)?;
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| CodecError::Malformed(format!("jwt encode: {e}")))
}

/// Verify an access token, returning the claims on success.
///
/// Expiry is checked with zero leeway: a token is rejected as soon as its
/// `exp` is in the past.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Result<AccessClaims, CodecError> {
    ensure_signing_key(secret)?;
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    decode::<AccessClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => CodecError::InvalidSignature,
            ErrorKind::ExpiredSignature => CodecError::Expired,
            _ => CodecError::Malformed(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef-test";

    fn claims(expires_in: i64) -> AccessClaims {
        let now = Utc::now();
        AccessClaims {
            user_id: 42,
            user_name: "Alice".into(),
            is_admin: false,
            issued_at: now.timestamp(),
            expires_at: (now + Duration::seconds(expires_in)).timestamp(),
        }
    }

    #[test]
    fn sign_then_verify_returns_same_claims() {
        let original = claims(900);
        let token = sign_access_token(&original, SECRET).unwrap();
        let decoded = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wire_format_uses_registered_timestamp_names() {
        let json = serde_json::to_value(claims(900)).unwrap();
        assert_eq!(json["user_id"], 42);
        assert_eq!(json["user_name"], "Alice");
        assert_eq!(json["is_admin"], false);
        assert!(json.get("iat").is_some());
        assert!(json.get("exp").is_some());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_access_token(&claims(-1), SECRET).unwrap();
        assert_eq!(
            verify_access_token(&token, SECRET),
            Err(CodecError::Expired)
        );
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let token = sign_access_token(&claims(900), SECRET).unwrap();
        let (body, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{body}.{}", chars.into_iter().collect::<String>());

        assert_eq!(
            verify_access_token(&tampered, SECRET),
            Err(CodecError::InvalidSignature)
        );
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let token = sign_access_token(&claims(900), SECRET).unwrap();
        let other = b"another-secret-that-is-long-enough-1234";
        assert_eq!(
            verify_access_token(&token, other),
            Err(CodecError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            verify_access_token("not-a-jwt", SECRET),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn short_key_is_a_config_error() {
        let short = b"too-short";
        assert!(matches!(
            sign_access_token(&claims(900), short),
            Err(CodecError::Config(_))
        ));
        assert!(matches!(
            verify_access_token("a.b.c", short),
            Err(CodecError::Config(_))
        ));
        assert!(matches!(
            ensure_signing_key(b""),
            Err(CodecError::Config(_))
        ));
    }

    #[test]
    fn key_of_exactly_minimum_length_is_accepted() {
        assert!(ensure_signing_key(&[b'k'; MIN_SIGNING_KEY_LEN]).is_ok());
    }
}
