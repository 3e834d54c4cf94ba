//! Recovers the acting user from a server-side session or a bearer access
//! token.

use std::sync::Arc;

use tracing::debug;

use super::tokens::TokenService;
use super::{AuthError, CodecError};
use crate::models::auth::{User, UserId};
use crate::session::SessionStore;
use crate::store::IdentityStore;

/// Raw credentials carried by a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    /// Session id from the session cookie, if any.
    pub session_id: Option<&'a str>,
    /// Value of the `Authorization` header, if any.
    pub authorization: Option<&'a str>,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the acting user. A live session takes precedence over a bearer
/// token when both are present.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenService,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenService,
    ) -> Self {
        Self {
            store,
            sessions,
            tokens,
        }
    }

    pub async fn resolve_actor(&self, credentials: &Credentials<'_>) -> Result<User, AuthError> {
        if let Some(session_id) = credentials.session_id
            && let Some(session) = self.sessions.load(session_id).await?
        {
            return self.load_user(session.user_id).await;
        }

        let header = credentials
            .authorization
            .ok_or_else(|| AuthError::Unauthenticated("Missing authorization header".into()))?;
        let token = bearer_token(header)
            .ok_or_else(|| AuthError::Unauthenticated("Invalid authorization scheme".into()))?;

        let claims = self
            .tokens
            .validate_access_token(token)
            .map_err(|e| match e {
                CodecError::Config(_) | CodecError::Hash(_) => AuthError::Token(e),
                other => {
                    debug!(reason = %other, "bearer token rejected");
                    AuthError::Unauthenticated(rejection_message(&other).into())
                }
            })?;

        self.load_user(claims.user_id).await
    }

    async fn load_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {user_id}")))
    }
}

/// Client-facing reason for a rejected bearer token. Decoder detail stays
/// in the log.
fn rejection_message(e: &CodecError) -> &'static str {
    match e {
        CodecError::Expired => "Token expired",
        CodecError::InvalidSignature => "Invalid token signature",
        _ => "Malformed token",
    }
}
