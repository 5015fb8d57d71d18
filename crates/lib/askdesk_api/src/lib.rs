//! # askdesk_api
//!
//! HTTP API library for Askdesk.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;

use askdesk_core::adapter::EndpointAdapter;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{chat, health, page, session};
use crate::services::sessions::SessionStore;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Endpoint adapter shared by every session.
    pub adapter: Arc<EndpointAdapter>,
    /// Per-browser chat sessions.
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: ApiConfig, adapter: Arc<EndpointAdapter>) -> Self {
        let sessions = SessionStore::new(config.chat.clone(), config.session_idle_timeout);
        Self {
            config,
            adapter,
            sessions,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(routes::GET_INDEX, get(page::index))
        .route(routes::GET_API_HEALTH, get(health::health))
        .route(routes::GET_API_SESSION, get(session::session_info_handler))
        .route(routes::POST_API_CHAT, post(chat::chat_handler))
        .route(
            routes::API_HISTORY,
            get(chat::history_handler).delete(chat::clear_history_handler),
        )
        .layer(axum::middleware::from_fn(middleware::session::ensure_session))
        .layer(axum::middleware::from_fn(middleware::identity::forwarded_identity))
        .layer(cors)
        .with_state(state)
}
