//! Identity store gateway.
//!
//! Abstract CRUD over users and refresh tokens. Every write is a single-row
//! (or single-statement) operation; no multi-row transactions are needed.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::auth::{
    NewRefreshToken, NewUser, ProfileUpdate, RefreshTokenRecord, User, UserId,
};

pub use memory::{MemoryIdentityStore, MemoryResourceOwners};
pub use postgres::{PgIdentityStore, PgMatchOwners};

/// Store errors. "Not found" is distinguished from backend failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Persistence operations for users and refresh tokens.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find the user linked to an external `(provider, provider_user_id)` pair.
    async fn find_user_by_external_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Fails with `Duplicate` if the external identity
    /// pair is already linked.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Overwrite the profile fields of an existing user.
    async fn update_user(&self, id: UserId, update: ProfileUpdate) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn create_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Delete every refresh token owned by `user_id`, returning how many went.
    async fn delete_refresh_tokens_for_user(&self, user_id: UserId) -> Result<u64, StoreError>;

    /// All refresh tokens whose expiry is strictly after `now`.
    async fn list_unexpired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    /// Delete one refresh token if it still exists. Returns `true` only for
    /// the caller whose delete removed the row.
    async fn delete_refresh_token(&self, id: i64) -> Result<bool, StoreError>;
}

/// Ownership lookup for a guarded resource (e.g. the organizer of a match).
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Owner of `resource_id`, or `None` if the resource does not exist.
    async fn owner_of(&self, resource_id: i64) -> Result<Option<UserId>, StoreError>;
}
