//! Role and ownership predicates evaluated before any business handler runs.

use tracing::debug;

use super::AuthError;
use super::resolver::{CredentialResolver, Credentials};
use crate::models::auth::User;
use crate::store::ResourceLookup;

/// Parse a path identifier. Only positive integers are valid ids.
pub fn parse_resource_id(raw: &str) -> Result<i64, AuthError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AuthError::Validation(format!("invalid id: {raw:?}"))),
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    resolver: CredentialResolver,
}

impl AuthorizationGate {
    pub fn new(resolver: CredentialResolver) -> Self {
        Self { resolver }
    }

    /// Resolve the actor or fail with `Unauthenticated`. A credential that
    /// points at a vanished user is reported as unauthenticated as well.
    pub async fn require_authenticated(
        &self,
        credentials: &Credentials<'_>,
    ) -> Result<User, AuthError> {
        self.resolver
            .resolve_actor(credentials)
            .await
            .map_err(|e| match e {
                AuthError::NotFound(what) => {
                    debug!(%what, "credential refers to a missing user");
                    AuthError::Unauthenticated("Not logged in".into())
                }
                other => other,
            })
    }

    /// Require an authenticated actor with the admin flag.
    pub async fn require_admin(&self, credentials: &Credentials<'_>) -> Result<User, AuthError> {
        let actor = self.require_authenticated(credentials).await?;
        if !actor.is_admin {
            debug!(user_id = actor.id, "admin role required");
            return Err(AuthError::Forbidden("Admin role required".into()));
        }
        Ok(actor)
    }

    /// Require that the actor owns the resource identified by `raw_id`.
    ///
    /// A missing resource is reported as `Forbidden`, the same as one owned
    /// by someone else.
    pub async fn require_resource_owner(
        &self,
        credentials: &Credentials<'_>,
        raw_id: &str,
        lookup: &dyn ResourceLookup,
    ) -> Result<User, AuthError> {
        let actor = self.require_authenticated(credentials).await?;
        let resource_id = parse_resource_id(raw_id)?;

        match lookup.owner_of(resource_id).await? {
            Some(owner) if owner == actor.id => Ok(actor),
            _ => {
                debug!(user_id = actor.id, resource_id, "ownership check failed");
                Err(AuthError::Forbidden("Organizer role required".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::auth::jwt::sign_access_token;
    use crate::auth::tokens::TokenService;
    use crate::models::auth::{AccessClaims, NewUser};
    use crate::session::MemorySessionStore;
    use crate::store::{IdentityStore, MemoryIdentityStore, MemoryResourceOwners};

    const SECRET: &[u8] = b"gate-test-secret-0123456789abcdef!!";

    struct Fixture {
        store: Arc<MemoryIdentityStore>,
        gate: AuthorizationGate,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryIdentityStore::new());
        let tokens = TokenService::new(store.clone(), SECRET).unwrap();
        let resolver = CredentialResolver::new(
            store.clone(),
            Arc::new(MemorySessionStore::new()),
            tokens,
        );
        Fixture {
            store,
            gate: AuthorizationGate::new(resolver),
        }
    }

    async fn user(store: &MemoryIdentityStore, social_id: &str) -> User {
        store
            .create_user(NewUser {
                social_provider: "facebook".into(),
                social_id: social_id.into(),
                name: social_id.into(),
                email: format!("{social_id}@example.com"),
                avatar_url: String::new(),
            })
            .await
            .unwrap()
    }

    fn header(user: &User) -> String {
        let token = sign_access_token(&AccessClaims::for_user(user, Utc::now()), SECRET).unwrap();
        format!("Bearer {token}")
    }

    fn creds(header: &str) -> Credentials<'_> {
        Credentials {
            session_id: None,
            authorization: Some(header),
        }
    }

    #[tokio::test]
    async fn no_credentials_is_unauthenticated() {
        let f = fixture();
        let err = f
            .gate
            .require_authenticated(&Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn missing_user_is_coarsened_to_unauthenticated() {
        let f = fixture();
        let mut ghost = user(&f.store, "ghost").await;
        ghost.id = 4242;
        let h = header(&ghost);
        let err = f.gate.require_authenticated(&creds(&h)).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn admin_gate_rejects_regular_users() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let h = header(&alice);
        let err = f.gate.require_admin(&creds(&h)).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admin_gate_admits_admins() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        f.store.set_admin(alice.id, true).await.unwrap();
        let h = header(&alice);

        let actor = f.gate.require_admin(&creds(&h)).await.unwrap();
        assert_eq!(actor.id, alice.id);
        assert!(actor.is_admin);
    }

    #[tokio::test]
    async fn admin_flag_is_read_from_store_not_token() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let mut forged_view = alice.clone();
        forged_view.is_admin = true;
        // Token claims say admin, the store does not.
        let h = header(&forged_view);
        let err = f.gate.require_admin(&creds(&h)).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn ownership_gate() {
        let f = fixture();
        let organizer = user(&f.store, "org").await;
        let other = user(&f.store, "other").await;
        let matches = MemoryResourceOwners::new();
        matches.insert(10, organizer.id);

        let h = header(&organizer);
        let actor = f
            .gate
            .require_resource_owner(&creds(&h), "10", &matches)
            .await
            .unwrap();
        assert_eq!(actor.id, organizer.id);

        let h = header(&other);
        let err = f
            .gate
            .require_resource_owner(&creds(&h), "10", &matches)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn ownership_of_missing_resource_is_forbidden() {
        let f = fixture();
        let organizer = user(&f.store, "org").await;
        let h = header(&organizer);
        let err = f
            .gate
            .require_resource_owner(&creds(&h), "99", &MemoryResourceOwners::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn ownership_with_bad_id_is_validation_error() {
        let f = fixture();
        let organizer = user(&f.store, "org").await;
        let h = header(&organizer);
        for raw in ["abc", "-1", "0", ""] {
            let err = f
                .gate
                .require_resource_owner(&creds(&h), raw, &MemoryResourceOwners::new())
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn ownership_checks_authentication_first() {
        let f = fixture();
        let err = f
            .gate
            .require_resource_owner(&Credentials::default(), "abc", &MemoryResourceOwners::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }
}
