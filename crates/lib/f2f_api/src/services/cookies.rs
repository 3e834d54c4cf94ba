//! Session cookie builders.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the server-side session id.
pub const SESSION_COOKIE: &str = "f2f_session";

/// Session cookie lifetime in days, matching the session store TTL.
const SESSION_MAX_AGE_DAYS: i64 = 7;

/// Build the httpOnly session cookie.
pub fn session_cookie(session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::days(SESSION_MAX_AGE_DAYS))
        .build()
}

/// Build an expired session cookie to clear browser state.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
