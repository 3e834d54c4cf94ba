//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use f2f_core::auth::{AuthError, CodecError};
use f2f_core::oauth::ExternalAuthError;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::BadGateway(m) => {
                error!(detail = %m, "upstream provider failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "bad_gateway",
                    "Authentication provider unavailable",
                )
            }
            AppError::Internal(m) => {
                error!(detail = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Unauthenticated(msg) => AppError::Unauthorized(msg),
            AuthError::InvalidCredential => {
                AppError::Unauthorized("Invalid or expired refresh token".into())
            }
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::ExternalAuth(e) => AppError::from(e),
            AuthError::Token(CodecError::Config(msg) | CodecError::Hash(msg)) => {
                AppError::Internal(msg)
            }
            AuthError::Token(e) => {
                debug!(reason = %e, "token rejected");
                AppError::Unauthorized("Invalid token".into())
            }
            AuthError::Store(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ExternalAuthError> for AppError {
    fn from(e: ExternalAuthError) -> Self {
        match e {
            ExternalAuthError::UnknownProvider(_) => AppError::Unauthorized(e.to_string()),
            // Denial reasons come from the provider or the callback query.
            ExternalAuthError::Denied(reason) => {
                debug!(%reason, "external login denied");
                AppError::Unauthorized("Authentication failed".into())
            }
            ExternalAuthError::Provider(msg) => AppError::BadGateway(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use f2f_core::store::StoreError;

    use super::*;

    fn status_of(e: AuthError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(status_of(AuthError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AuthError::Unauthenticated("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AuthError::InvalidCredential), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AuthError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AuthError::Token(CodecError::Expired)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AuthError::Token(CodecError::Config("no key".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AuthError::Store(StoreError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn provider_failures_are_bad_gateway() {
        assert_eq!(
            status_of(AuthError::ExternalAuth(ExternalAuthError::Provider("timeout".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AuthError::ExternalAuth(ExternalAuthError::Denied("no".into()))),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AuthError::ExternalAuth(ExternalAuthError::UnknownProvider(
                "myspace".into()
            ))),
            StatusCode::UNAUTHORIZED
        );
    }

    async fn body_of(e: AppError) -> serde_json::Value {
        let body = axum::body::to_bytes(e.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn provider_denial_detail_stays_out_of_the_body() {
        let upstream = r#"{"error":{"message":"Invalid verification code","fbtrace_id":"AbC"}}"#;
        let json = body_of(AppError::from(AuthError::ExternalAuth(
            ExternalAuthError::Denied(upstream.into()),
        )))
        .await;
        assert_eq!(json["error"], "unauthorized");
        assert_eq!(json["message"], "Authentication failed");
    }

    #[tokio::test]
    async fn token_decode_detail_stays_out_of_the_body() {
        let json = body_of(AppError::from(AuthError::Token(CodecError::Malformed(
            "InvalidSignature".into(),
        ))))
        .await;
        assert!(!json["message"].as_str().unwrap().contains("InvalidSignature"));
    }
}
