//! External login, session exchange, refresh and logout handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;
use f2f_core::oauth::CallbackParams;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginResponse, RefreshRequest, TokenResponse};
use crate::services::auth;
use crate::services::cookies::{SESSION_COOKIE, clear_session_cookie, session_cookie};

/// `GET /auth/{provider}`: redirect the browser to the provider.
pub async fn begin_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Redirect> {
    let url = auth::begin_login(&state, &provider).await?;
    Ok(Redirect::temporary(&url))
}

/// `GET /auth/{provider}/callback`: finish the login, open a session and
/// return the user with a fresh token pair.
pub async fn callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let previous = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let outcome = auth::complete_login(&state, &provider, params, previous.as_deref()).await?;

    let jar = jar.add(session_cookie(&outcome.session_id, state.config.secure_cookie));
    Ok((
        jar,
        Json(LoginResponse {
            user: outcome.user.into(),
            tokens: outcome.tokens.into(),
        }),
    ))
}

/// `GET /auth/token`: exchange the current session (or bearer token) for a
/// new token pair. Earlier refresh tokens of the user are revoked.
pub async fn token_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> AppResult<Json<TokenResponse>> {
    let tokens = auth::exchange_session(&state, &user).await?;
    Ok(Json(tokens.into()))
}

/// `POST /auth/refresh`: rotate a refresh token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(body) = body.map_err(|e| {
        debug!(error = %e, "unreadable refresh request");
        AppError::Validation("Invalid request body".into())
    })?;
    let raw = body
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("refresh_token is required".into()))?;

    let tokens = auth::refresh(&state, &raw).await?;
    Ok(Json(tokens.into()))
}

/// `GET /logout`: end the session and send the browser home.
pub async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    auth::logout(&state, session_id.as_deref()).await;

    let jar = jar.add(clear_session_cookie(state.config.secure_cookie));
    (jar, Redirect::temporary("/"))
}
