//! Browser session cookie.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::services::cookies::{SESSION_COOKIE, session_cookie};

/// Session id stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

/// Axum middleware: resolves the session id from the `askdesk_session`
/// cookie, minting a new one (and setting the cookie) when absent or invalid.
pub async fn ensure_session(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok());
    let id = existing.unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(SessionId(id));
    let response = next.run(request).await;

    if existing.is_some() {
        response
    } else {
        (jar.add(session_cookie(id)), response).into_response()
    }
}
