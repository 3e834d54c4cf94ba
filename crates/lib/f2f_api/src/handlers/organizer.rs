//! Endpoints restricted to a match's organizer.

use axum::Json;
use axum::extract::{Extension, Path};

use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::MatchResponse;

/// `GET /organizer/matches/{id}`: the organizer's view of a match. The
/// ownership guard has already validated the id.
pub async fn get_match_handler(
    Extension(AuthenticatedUser(organizer)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<MatchResponse>> {
    Ok(Json(MatchResponse {
        id,
        organizer_id: organizer.id,
    }))
}
