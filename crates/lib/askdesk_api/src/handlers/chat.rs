//! Chat and history handlers.

use askdesk_core::message::ChatMessage;
use askdesk_core::session::{FailureNotice, SessionState};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::session::SessionId;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

/// A failure notice with its display copy.
#[derive(Debug, Serialize)]
pub struct NoticeView {
    #[serde(flatten)]
    pub notice: FailureNotice,
    pub headline: &'static str,
    pub guidance: &'static str,
}

impl From<FailureNotice> for NoticeView {
    fn from(notice: FailureNotice) -> Self {
        Self {
            headline: notice.headline(),
            guidance: notice.guidance(),
            notice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<NoticeView>,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub state: SessionState,
    pub messages: Vec<ChatMessage>,
}

/// `POST /api/chat`: submit a prompt (typed or an example question).
///
/// Holds the session lock for the whole adapter call, so a second prompt
/// from the same browser waits for the first.
pub async fn chat_handler(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let Json(body) = payload?;
    let session = state.sessions.get_or_create(session_id);
    let mut session = session.lock().await;

    let outcome = session.submit(&body.prompt, &state.adapter).await?;
    let history = session.history().to_vec();
    session.rendered();

    Ok(Json(ChatResponse {
        reply: outcome.reply.content,
        notice: outcome.notice.map(NoticeView::from),
        history,
    }))
}

/// `GET /api/history`: the session's conversation so far. An unknown
/// session reads as idle and empty without being created.
pub async fn history_handler(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
) -> Json<HistoryResponse> {
    let Some(session) = state.sessions.get(session_id) else {
        return Json(HistoryResponse {
            state: SessionState::Idle,
            messages: Vec::new(),
        });
    };
    let session = session.lock().await;
    Json(HistoryResponse {
        state: session.state(),
        messages: session.history().to_vec(),
    })
}

/// `DELETE /api/history`: clear the conversation.
pub async fn clear_history_handler(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
) -> StatusCode {
    if let Some(session) = state.sessions.get(session_id) {
        session.lock().await.clear();
    }
    StatusCode::NO_CONTENT
}
