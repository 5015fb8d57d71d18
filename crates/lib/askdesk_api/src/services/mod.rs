//! Shared services used by handlers and middleware.

pub mod cookies;
pub mod sessions;
