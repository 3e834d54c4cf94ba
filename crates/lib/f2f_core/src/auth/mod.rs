//! Authentication and authorization logic.
//!
//! Provides the credential codec (JWT signing, refresh-secret hashing),
//! identity reconciliation, the token lifecycle service, credential
//! resolution and the authorization gate shared by every protected route.

pub mod gate;
pub mod jwt;
pub mod reconcile;
pub mod resolver;
pub mod secret;
pub mod tokens;

use thiserror::Error;

use crate::oauth::ExternalAuthError;
use crate::store::StoreError;

/// Errors raised by the credential codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Signing key misconfigured: {0}")]
    Config(String),

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("secret hashing failed: {0}")]
    Hash(String),
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Refresh secret unknown, expired, already rotated or forged.
    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External login failed: {0}")]
    ExternalAuth(#[from] ExternalAuthError),

    #[error("Token error: {0}")]
    Token(#[from] CodecError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
