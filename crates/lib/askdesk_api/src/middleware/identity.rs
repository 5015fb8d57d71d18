//! Upstream proxy identity.
//!
//! The reverse proxy in front of the app has already authenticated the user
//! and forwards who they are in headers. They are read for display only and
//! never used for authorization.

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use serde::Serialize;

pub const PREFERRED_USERNAME_HEADER: &str = "x-forwarded-preferred-username";
pub const EMAIL_HEADER: &str = "x-forwarded-email";
pub const USER_ID_HEADER: &str = "x-forwarded-user";

/// Name shown when the proxy did not supply one.
pub const GUEST: &str = "Guest";

/// Identity forwarded by the proxy, stored in request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_id: Option<String>,
}

impl UserIdentity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            user_name: read(PREFERRED_USERNAME_HEADER),
            user_email: read(EMAIL_HEADER),
            user_id: read(USER_ID_HEADER),
        }
    }

    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(GUEST)
    }
}

/// Axum middleware: copies the forwarded identity headers into a
/// `UserIdentity` request extension.
pub async fn forwarded_identity(mut request: Request, next: Next) -> Response {
    let identity = UserIdentity::from_headers(request.headers());
    request.extensions_mut().insert(identity);
    next.run(request).await
}
