//! Login, token and logout flows composed from the core components.

use f2f_core::auth::AuthError;
use f2f_core::models::auth::{SessionData, TokenPair, User};
use f2f_core::oauth::CallbackParams;
use tracing::{info, warn};

use crate::AppState;

/// Result of a completed external login.
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
    pub session_id: String,
}

/// Start an external login and return the provider URL.
pub async fn begin_login(state: &AppState, provider: &str) -> Result<String, AuthError> {
    Ok(state.oauth.begin(provider).await?)
}

/// Finish an external login: reconcile the identity, issue a fresh pair and
/// open a new session. `previous_session` is destroyed if present.
pub async fn complete_login(
    state: &AppState,
    provider: &str,
    params: CallbackParams,
    previous_session: Option<&str>,
) -> Result<LoginOutcome, AuthError> {
    let identity = state.oauth.complete(provider, params).await?;
    let user = state.reconciler.reconcile(identity).await?;
    let tokens = state.tokens.issue_login_pair(&user).await?;

    if let Some(previous) = previous_session {
        state.sessions.destroy(previous).await?;
    }
    let session_id = state.sessions.create(SessionData::for_user(&user)).await?;

    info!(user_id = user.id, provider, "user logged in");
    Ok(LoginOutcome {
        user,
        tokens,
        session_id,
    })
}

/// Exchange an established session for an API token pair.
pub async fn exchange_session(state: &AppState, user: &User) -> Result<TokenPair, AuthError> {
    let tokens = state.tokens.issue_login_pair(user).await?;
    info!(user_id = user.id, "issued token pair from session");
    Ok(tokens)
}

/// Rotate a refresh secret.
pub async fn refresh(state: &AppState, raw_secret: &str) -> Result<TokenPair, AuthError> {
    state.tokens.rotate_from_refresh(raw_secret).await
}

/// Revoke the session user's refresh tokens and destroy the session.
///
/// Never fails: the browser is logged out even if revocation does not go
/// through.
pub async fn logout(state: &AppState, session_id: Option<&str>) {
    let Some(session_id) = session_id else {
        return;
    };

    match state.sessions.load(session_id).await {
        Ok(Some(session)) => {
            if let Err(e) = state.tokens.revoke_all_for_user(session.user_id).await {
                warn!(user_id = session.user_id, error = %e, "failed to revoke refresh tokens on logout");
            }
            info!(user_id = session.user_id, "user logged out");
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "failed to load session on logout"),
    }

    if let Err(e) = state.sessions.destroy(session_id).await {
        warn!(error = %e, "failed to destroy session");
    }
}
