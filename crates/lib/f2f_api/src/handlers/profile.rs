use axum::Json;
use axum::extract::Extension;

use crate::middleware::auth::AuthenticatedUser;
use crate::models::UserResponse;

/// `GET /profile`: the authenticated user.
pub async fn profile_handler(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<UserResponse> {
    Json(user.into())
}
