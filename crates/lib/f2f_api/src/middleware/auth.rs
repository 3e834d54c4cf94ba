//! Authentication and authorization middleware.
//!
//! Each guard resolves the actor through the authorization gate and injects
//! [`AuthenticatedUser`] into request extensions.

use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use f2f_core::auth::resolver::Credentials;
use f2f_core::models::auth::User;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::SESSION_COOKIE;

/// The actor of the current request, set by the guards below.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Owned copy of the credentials carried by a request.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub session_id: Option<String>,
    pub authorization: Option<String>,
}

impl RequestCredentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = CookieJar::from_headers(headers);
        Self {
            session_id: jar
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty()),
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    pub fn as_credentials(&self) -> Credentials<'_> {
        Credentials {
            session_id: self.session_id.as_deref(),
            authorization: self.authorization.as_deref(),
        }
    }
}

/// Require a session or bearer token naming an existing user.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credentials = RequestCredentials::from_headers(request.headers());
    let user = state
        .gate
        .require_authenticated(&credentials.as_credentials())
        .await?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Require an authenticated admin.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credentials = RequestCredentials::from_headers(request.headers());
    let user = state.gate.require_admin(&credentials.as_credentials()).await?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Require that the actor organizes the match named by the `{id}` path
/// segment. Must be installed with `route_layer`.
pub async fn require_match_organizer(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credentials = RequestCredentials::from_headers(request.headers());
    let user = state
        .gate
        .require_resource_owner(&credentials.as_credentials(), &raw_id, state.matches.as_ref())
        .await?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}
