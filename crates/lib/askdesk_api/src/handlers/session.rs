//! Page-load session info.

use askdesk_core::session::{EXAMPLE_GROUPS, ExampleGroup, SessionState};
use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::AppState;
use crate::middleware::identity::UserIdentity;
use crate::middleware::session::SessionId;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoResponse {
    pub display_name: String,
    pub identity: UserIdentity,
    pub endpoint: String,
    pub endpoint_supported: bool,
    pub state: SessionState,
    pub message_count: usize,
    pub examples: &'static [ExampleGroup],
    pub server_time: String,
}

/// `GET /api/session`: opens the session and returns what the page needs
/// on load. Endpoint support is checked fresh on every call.
pub async fn session_info_handler(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
    Extension(identity): Extension<UserIdentity>,
) -> Json<SessionInfoResponse> {
    let endpoint = state.config.chat.endpoint_name.clone();
    let endpoint_supported = state.adapter.endpoint_supported(&endpoint).await;

    let session = state.sessions.get_or_create(session_id);
    let mut session = session.lock().await;
    session.open();

    Json(SessionInfoResponse {
        display_name: identity.display_name().to_string(),
        identity,
        endpoint,
        endpoint_supported,
        state: session.state(),
        message_count: session.history().len(),
        examples: EXAMPLE_GROUPS,
        server_time: chrono::Local::now().format("%I:%M %p").to_string(),
    })
}
