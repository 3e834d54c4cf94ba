//! In-memory identity store for tests and database-less development runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use super::{IdentityStore, ResourceLookup, StoreError};
use crate::models::auth::{
    NewRefreshToken, NewUser, ProfileUpdate, RefreshTokenRecord, User, UserId,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    refresh_tokens: BTreeMap<i64, RefreshTokenRecord>,
    last_user_id: UserId,
    last_token_id: i64,
}

/// Identity store kept in process memory. Enforces the same uniqueness rule
/// as the `users` table.
#[derive(Default)]
pub struct MemoryIdentityStore {
    tables: RwLock<Tables>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the admin flag. Admin rights are granted out-of-band,
    /// never through login.
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_admin = is_admin;
        Ok(user.clone())
    }

    /// Number of stored refresh tokens, expired ones included.
    pub async fn refresh_token_count(&self) -> usize {
        self.tables.read().await.refresh_tokens.len()
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_user_by_external_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.social_provider == provider && u.social_id == provider_user_id)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let taken = tables.users.values().any(|u| {
            u.social_provider == user.social_provider && u.social_id == user.social_id
        });
        if taken {
            return Err(StoreError::Duplicate(format!(
                "{}:{}",
                user.social_provider, user.social_id
            )));
        }
        tables.last_user_id += 1;
        let now = Utc::now();
        let record = User {
            id: tables.last_user_id,
            social_provider: user.social_provider,
            social_id: user.social_id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, id: UserId, update: ProfileUpdate) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.name = update.name;
        user.email = update.email;
        user.avatar_url = update.avatar_url;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_token_id += 1;
        let record = RefreshTokenRecord {
            id: tables.last_token_id,
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        tables.refresh_tokens.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn list_unexpired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .refresh_tokens
            .values()
            .filter(|t| t.expires_at > now)
            .cloned()
            .collect())
    }

    async fn delete_refresh_token(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.refresh_tokens.remove(&id).is_some())
    }
}

/// In-memory resource ownership table (resource id → owner id).
#[derive(Default)]
pub struct MemoryResourceOwners {
    owners: DashMap<i64, UserId>,
}

impl MemoryResourceOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource_id: i64, owner_id: UserId) {
        self.owners.insert(resource_id, owner_id);
    }
}

#[async_trait]
impl ResourceLookup for MemoryResourceOwners {
    async fn owner_of(&self, resource_id: i64) -> Result<Option<UserId>, StoreError> {
        Ok(self.owners.get(&resource_id).map(|owner| *owner))
    }
}
