//! Issuance, validation, rotation and revocation of access/refresh pairs.
//!
//! Refresh secrets are single use: rotation deletes the consumed record with
//! a delete-if-present, and only the caller whose delete removed the row
//! receives a new pair.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use super::jwt::{ensure_signing_key, sign_access_token, verify_access_token};
use super::secret::{BCRYPT_COST, generate_refresh_secret, hash_secret, verify_secret};
use super::{AuthError, CodecError};
use crate::models::auth::{
    ACCESS_TOKEN_EXPIRY_SECS, AccessClaims, NewRefreshToken, REFRESH_TOKEN_EXPIRY_DAYS,
    RefreshTokenRecord, TokenPair, User, UserId,
};
use crate::store::IdentityStore;

/// Issues and rotates credential pairs for users.
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn IdentityStore>,
    jwt_secret: Arc<[u8]>,
    hash_cost: u32,
}

impl TokenService {
    /// Fails with `CodecError::Config` if the signing key is absent or
    /// shorter than 32 bytes.
    pub fn new(store: Arc<dyn IdentityStore>, jwt_secret: &[u8]) -> Result<Self, CodecError> {
        ensure_signing_key(jwt_secret)?;
        Ok(Self {
            store,
            jwt_secret: Arc::from(jwt_secret),
            hash_cost: BCRYPT_COST,
        })
    }

    /// Override the bcrypt cost used for new refresh-secret hashes.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Verify an access token and return its claims.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, CodecError> {
        verify_access_token(token, &self.jwt_secret)
    }

    /// Issue a new access token and refresh secret for `user`.
    ///
    /// The returned `refresh_token` is the raw secret; only its hash is stored.
    pub async fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_token = sign_access_token(&AccessClaims::for_user(user, now), &self.jwt_secret)?;

        let refresh_token = generate_refresh_secret();
        let token_hash = hash_blocking(refresh_token.clone(), self.hash_cost).await?;

        self.store
            .create_refresh_token(NewRefreshToken {
                user_id: user.id,
                token_hash,
                expires_at: now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
            })
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_EXPIRY_SECS,
        })
    }

    /// Issue a pair after a login or session exchange. Previously issued
    /// refresh tokens of the user are revoked first, so a user holds at most
    /// one live refresh token.
    pub async fn issue_login_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let revoked = self.store.delete_refresh_tokens_for_user(user.id).await?;
        if revoked > 0 {
            debug!(user_id = user.id, revoked, "revoked previous refresh tokens");
        }
        self.issue_pair(user).await
    }

    /// Consume a refresh secret and mint a new pair.
    ///
    /// Unknown, expired, already rotated and forged secrets all fail with
    /// `AuthError::InvalidCredential`.
    pub async fn rotate_from_refresh(&self, raw_secret: &str) -> Result<TokenPair, AuthError> {
        if raw_secret.is_empty() {
            return Err(AuthError::InvalidCredential);
        }

        let candidates = self
            .store
            .list_unexpired_refresh_tokens(Utc::now())
            .await?;
        let matched = find_matching_blocking(raw_secret.to_string(), candidates)
            .await?
            .ok_or_else(|| {
                debug!("refresh secret matched no live token");
                AuthError::InvalidCredential
            })?;

        if !self.store.delete_refresh_token(matched.id).await? {
            debug!(user_id = matched.user_id, "refresh token consumed concurrently");
            return Err(AuthError::InvalidCredential);
        }

        let user = self
            .store
            .find_user_by_id(matched.user_id)
            .await?
            .ok_or_else(|| {
                debug!(user_id = matched.user_id, "refresh token owner no longer exists");
                AuthError::InvalidCredential
            })?;

        let pair = self.issue_pair(&user).await?;
        info!(user_id = user.id, "rotated refresh token");
        Ok(pair)
    }

    /// Delete every refresh token of `user_id`. Idempotent.
    pub async fn revoke_all_for_user(&self, user_id: UserId) -> Result<u64, AuthError> {
        let revoked = self.store.delete_refresh_tokens_for_user(user_id).await?;
        info!(user_id, revoked, "revoked refresh tokens");
        Ok(revoked)
    }
}

/// bcrypt is CPU bound; keep it off the async workers.
async fn hash_blocking(raw: String, cost: u32) -> Result<String, AuthError> {
    let hashed = tokio::task::spawn_blocking(move || hash_secret(&raw, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task: {e}")))??;
    Ok(hashed)
}

async fn find_matching_blocking(
    raw: String,
    candidates: Vec<RefreshTokenRecord>,
) -> Result<Option<RefreshTokenRecord>, AuthError> {
    tokio::task::spawn_blocking(move || {
        candidates
            .into_iter()
            .find(|record| verify_secret(&raw, &record.token_hash))
    })
    .await
    .map_err(|e| AuthError::Internal(format!("verify task: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::reconcile::IdentityReconciler;
    use crate::auth::secret::TEST_COST;
    use crate::models::auth::ExternalIdentity;
    use crate::store::MemoryIdentityStore;

    const SECRET: &[u8] = b"tokens-test-secret-0123456789abcdef";

    async fn setup() -> (Arc<MemoryIdentityStore>, TokenService, User) {
        let store = Arc::new(MemoryIdentityStore::new());
        let service = TokenService::new(store.clone(), SECRET)
            .unwrap()
            .with_hash_cost(TEST_COST);
        let user = IdentityReconciler::new(store.clone())
            .reconcile(ExternalIdentity {
                provider: "facebook".into(),
                provider_user_id: "abc123".into(),
                name: "Alice".into(),
                email: "alice@example.com".into(),
                avatar_url: String::new(),
            })
            .await
            .unwrap();
        (store, service, user)
    }

    #[tokio::test]
    async fn first_login_then_refresh_scenario() {
        let (store, service, user) = setup().await;
        assert!(!user.is_admin);
        assert_eq!(store.user_count().await, 1);

        let pair = service.issue_login_pair(&user).await.unwrap();
        let claims = service.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, user.id);

        let next = service
            .rotate_from_refresh(&pair.refresh_token)
            .await
            .unwrap();
        assert_eq!(
            service.validate_access_token(&next.access_token).unwrap().user_id,
            user.id
        );
        assert!(matches!(
            service.rotate_from_refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn weak_key_is_rejected_at_construction() {
        let store = Arc::new(MemoryIdentityStore::new());
        assert!(matches!(
            TokenService::new(store, b"short"),
            Err(CodecError::Config(_))
        ));
    }

    #[tokio::test]
    async fn issued_pair_carries_user_claims_and_stores_only_hash() {
        let (store, service, user) = setup().await;

        let pair = service.issue_pair(&user).await.unwrap();
        assert_eq!(pair.expires_in, 900);

        let claims = service.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.user_name, "Alice");
        assert!(!claims.is_admin);
        assert_eq!(claims.expires_at - claims.issued_at, 900);

        let stored = store
            .list_unexpired_refresh_tokens(Utc::now())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0].token_hash, pair.refresh_token);
        assert!(verify_secret(&pair.refresh_token, &stored[0].token_hash));
        let lifetime = stored[0].expires_at - Utc::now();
        assert!(lifetime > Duration::days(6) && lifetime <= Duration::days(7));
    }

    #[tokio::test]
    async fn rotation_is_single_use() {
        let (store, service, user) = setup().await;
        let first = service.issue_pair(&user).await.unwrap();

        let second = service
            .rotate_from_refresh(&first.refresh_token)
            .await
            .unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(
            service
                .validate_access_token(&second.access_token)
                .unwrap()
                .user_id,
            user.id
        );

        let reused = service.rotate_from_refresh(&first.refresh_token).await;
        assert!(matches!(reused, Err(AuthError::InvalidCredential)));

        // The rotated secret keeps working, once.
        service
            .rotate_from_refresh(&second.refresh_token)
            .await
            .unwrap();
        assert_eq!(store.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn forged_and_empty_secrets_are_invalid() {
        let (_store, service, user) = setup().await;
        service.issue_pair(&user).await.unwrap();

        assert!(matches!(
            service.rotate_from_refresh("forged").await,
            Err(AuthError::InvalidCredential)
        ));
        assert!(matches!(
            service.rotate_from_refresh("").await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn expired_record_never_rotates() {
        let (store, service, user) = setup().await;
        let raw = generate_refresh_secret();
        store
            .create_refresh_token(NewRefreshToken {
                user_id: user.id,
                token_hash: hash_secret(&raw, TEST_COST).unwrap(),
                expires_at: Utc::now() - Duration::seconds(1),
            })
            .await
            .unwrap();

        assert!(matches!(
            service.rotate_from_refresh(&raw).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rotation_has_one_winner() {
        let (_store, service, user) = setup().await;
        let pair = service.issue_pair(&user).await.unwrap();

        let (a, b) = tokio::join!(
            service.rotate_from_refresh(&pair.refresh_token),
            service.rotate_from_refresh(&pair.refresh_token),
        );
        let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(
            [a, b]
                .into_iter()
                .any(|r| matches!(r, Err(AuthError::InvalidCredential)))
        );
    }

    #[tokio::test]
    async fn revoke_all_is_idempotent() {
        let (store, service, user) = setup().await;
        let pair = service.issue_pair(&user).await.unwrap();
        service.issue_pair(&user).await.unwrap();

        assert_eq!(service.revoke_all_for_user(user.id).await.unwrap(), 2);
        assert_eq!(service.revoke_all_for_user(user.id).await.unwrap(), 0);
        assert_eq!(store.refresh_token_count().await, 0);
        assert!(matches!(
            service.rotate_from_refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn login_pair_replaces_previous_refresh_tokens() {
        let (store, service, user) = setup().await;
        let old = service.issue_pair(&user).await.unwrap();

        let fresh = service.issue_login_pair(&user).await.unwrap();
        assert_eq!(store.refresh_token_count().await, 1);
        assert!(matches!(
            service.rotate_from_refresh(&old.refresh_token).await,
            Err(AuthError::InvalidCredential)
        ));
        service
            .rotate_from_refresh(&fresh.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rotation_for_vanished_owner_is_invalid() {
        let store = Arc::new(MemoryIdentityStore::new());
        let service = TokenService::new(store.clone(), SECRET)
            .unwrap()
            .with_hash_cost(TEST_COST);
        let raw = generate_refresh_secret();
        store
            .create_refresh_token(NewRefreshToken {
                user_id: 777,
                token_hash: hash_secret(&raw, TEST_COST).unwrap(),
                expires_at: Utc::now() + Duration::days(1),
            })
            .await
            .unwrap();

        assert!(matches!(
            service.rotate_from_refresh(&raw).await,
            Err(AuthError::InvalidCredential)
        ));
    }
}
