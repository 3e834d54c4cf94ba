//! Admin-only endpoints.

use axum::Json;
use axum::extract::{Extension, Path, State};
use f2f_core::auth::gate::parse_resource_id;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::UserResponse;

/// `GET /admin/users/{id}`: look up any user.
pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let id = parse_resource_id(&raw_id)?;
    debug!(admin_id = admin.id, user_id = id, "admin user lookup");
    let user = state
        .store
        .find_user_by_id(id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
    Ok(Json(user.into()))
}
