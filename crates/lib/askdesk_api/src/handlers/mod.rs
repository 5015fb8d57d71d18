//! Request handlers.

pub mod chat;
pub mod health;
pub mod page;
pub mod session;
