//! Identity and credential domain models.
//!
//! These are internal domain models, distinct from the HTTP response shapes
//! defined in `f2f_api::models`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned numeric user identifier.
pub type UserId = i64;

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Local identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub social_provider: String,
    pub social_id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new user. There is no admin field: new users
/// are always created without the admin flag.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub social_provider: String,
    pub social_id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
}

/// Profile fields that may change on a repeated login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub avatar_url: String,
}

/// Identity claims verified by an external OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider: String,
    pub provider_user_id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
}

/// Refresh token record stored in the database. Only the bcrypt hash of the
/// secret is ever kept.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a refresh token record.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub user_name: String,
    pub is_admin: bool,
    /// Issued at (unix timestamp).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry (unix timestamp).
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl AccessClaims {
    /// Claims for `user`, valid for 15 minutes from `now`.
    pub fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            is_admin: user.is_admin,
            issued_at: now.timestamp(),
            expires_at: (now + Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS)).timestamp(),
        }
    }
}

/// Freshly issued credentials. `refresh_token` is the raw secret and exists
/// only in this value and in the response sent to the client.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Server-side session contents. `user_name` is cached for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: UserId,
    pub user_name: String,
}

impl SessionData {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
        }
    }
}
