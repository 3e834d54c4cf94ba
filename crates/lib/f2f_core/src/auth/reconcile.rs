//! Merges an externally verified identity into the local user record.
//!
//! Profile fields (name, email, avatar) are taken from the provider on every
//! login. The external identity pair and the admin flag never are.

use std::sync::Arc;

use tracing::{debug, info};

use super::AuthError;
use crate::models::auth::{ExternalIdentity, NewUser, ProfileUpdate, User, UserId};
use crate::store::{IdentityStore, StoreError};

/// Maximum display name length.
const MAX_NAME_LEN: usize = 100;

/// Validate the profile fields asserted by a provider.
/// Returns a list of validation error messages (empty = valid).
pub fn validate_identity(identity: &ExternalIdentity) -> Vec<String> {
    let mut errors = Vec::new();

    if identity.provider.trim().is_empty() {
        errors.push("provider is required".to_string());
    }
    if identity.provider_user_id.trim().is_empty() {
        errors.push("provider user id is required".to_string());
    }

    let name = identity.name.trim();
    if name.is_empty() {
        errors.push("name is required".to_string());
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("name must be at most {MAX_NAME_LEN} characters"));
    }

    if identity.email.trim().is_empty() {
        errors.push("email is required".to_string());
    } else if !is_plausible_email(&identity.email) {
        errors.push("email must be a valid email".to_string());
    }

    if !identity.avatar_url.is_empty() && !is_http_url(&identity.avatar_url) {
        errors.push("avatar_url must be a valid URL".to_string());
    }

    errors
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

/// Create-or-update of local users from external identities.
#[derive(Clone)]
pub struct IdentityReconciler {
    store: Arc<dyn IdentityStore>,
}

impl IdentityReconciler {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Return the local user for `identity`, creating it on first login and
    /// refreshing its profile fields afterwards.
    pub async fn reconcile(&self, identity: ExternalIdentity) -> Result<User, AuthError> {
        let errors = validate_identity(&identity);
        if !errors.is_empty() {
            return Err(AuthError::Validation(format!(
                "Invalid user data from {}: {}",
                identity.provider,
                errors.join("; ")
            )));
        }

        let existing = self
            .store
            .find_user_by_external_identity(&identity.provider, &identity.provider_user_id)
            .await?;
        if let Some(user) = existing {
            return self.refresh_profile(user.id, identity).await;
        }

        let created = self
            .store
            .create_user(NewUser {
                social_provider: identity.provider.clone(),
                social_id: identity.provider_user_id.clone(),
                name: identity.name.clone(),
                email: identity.email.clone(),
                avatar_url: identity.avatar_url.clone(),
            })
            .await;

        match created {
            Ok(user) => {
                info!(user_id = user.id, provider = %user.social_provider, "created user from external login");
                Ok(user)
            }
            // A concurrent first login for the same identity won the insert.
            Err(StoreError::Duplicate(what)) => {
                debug!(%what, "user created concurrently, updating instead");
                let user = self
                    .store
                    .find_user_by_external_identity(&identity.provider, &identity.provider_user_id)
                    .await?
                    .ok_or(StoreError::Duplicate(what))?;
                self.refresh_profile(user.id, identity).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_profile(
        &self,
        id: UserId,
        identity: ExternalIdentity,
    ) -> Result<User, AuthError> {
        let updated = self
            .store
            .update_user(
                id,
                ProfileUpdate {
                    name: identity.name,
                    email: identity.email,
                    avatar_url: identity.avatar_url,
                },
            )
            .await?;
        info!(user_id = updated.id, "refreshed user profile from external login");
        Ok(updated)
    }
}
