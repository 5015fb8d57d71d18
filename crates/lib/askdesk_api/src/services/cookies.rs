//! Cookie service: build the httpOnly session cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use uuid::Uuid;

/// Cookie name for the chat session id.
pub const SESSION_COOKIE: &str = "askdesk_session";

/// Build a httpOnly session cookie. No max-age: it lives as long as the
/// browser session, like the history it points at.
pub fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .build()
}
