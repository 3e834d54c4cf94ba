//! PostgreSQL-backed identity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{IdentityStore, ResourceLookup, StoreError};
use crate::models::auth::{
    NewRefreshToken, NewUser, ProfileUpdate, RefreshTokenRecord, User, UserId,
};

type UserRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

type RefreshTokenRow = (i64, i64, String, DateTime<Utc>, DateTime<Utc>);

const USER_COLUMNS: &str =
    "id, social_provider, social_id, name, email, avatar_url, is_admin, created_at, updated_at";

fn user_from_row(row: UserRow) -> User {
    let (id, social_provider, social_id, name, email, avatar_url, is_admin, created_at, updated_at) =
        row;
    User {
        id,
        social_provider,
        social_id,
        name,
        email,
        avatar_url,
        is_admin,
        created_at,
        updated_at,
    }
}

fn refresh_token_from_row(row: RefreshTokenRow) -> RefreshTokenRecord {
    let (id, user_id, token_hash, expires_at, created_at) = row;
    RefreshTokenRecord {
        id,
        user_id,
        token_hash,
        expires_at,
        created_at,
    }
}

/// Map unique-constraint violations to `StoreError::Duplicate`.
fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return StoreError::Duplicate(db.message().to_string());
    }
    StoreError::from(e)
}

/// Identity store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_user_by_external_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE social_provider = $1 AND social_id = $2"
        ))
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (social_provider, social_id, name, email, avatar_url, is_admin) \
             VALUES ($1, $2, $3, $4, $5, FALSE) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.social_provider)
        .bind(&user.social_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;
        Ok(user_from_row(row))
    }

    async fn update_user(&self, id: UserId, update: ProfileUpdate) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET name = $2, email = $3, avatar_url = $4, updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.avatar_url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).ok_or(StoreError::NotFound)
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn create_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3) \
             RETURNING id, user_id, token_hash, expires_at, created_at",
        )
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(refresh_token_from_row(row))
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_unexpired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, user_id, token_hash, expires_at, created_at \
             FROM refresh_tokens WHERE expires_at > $1 ORDER BY id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(refresh_token_from_row).collect())
    }

    async fn delete_refresh_token(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Match organizer lookup backing the organizer-only routes.
#[derive(Clone)]
pub struct PgMatchOwners {
    pool: PgPool,
}

impl PgMatchOwners {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceLookup for PgMatchOwners {
    async fn owner_of(&self, resource_id: i64) -> Result<Option<UserId>, StoreError> {
        let owner = sqlx::query_scalar::<_, i64>("SELECT organizer_id FROM matches WHERE id = $1")
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }
}
