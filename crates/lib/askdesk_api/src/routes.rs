//! Route paths.

pub const GET_INDEX: &str = "/";
pub const GET_API_HEALTH: &str = "/api/health";
pub const GET_API_SESSION: &str = "/api/session";
pub const POST_API_CHAT: &str = "/api/chat";
pub const API_HISTORY: &str = "/api/history";
