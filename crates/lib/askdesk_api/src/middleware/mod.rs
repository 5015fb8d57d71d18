//! Request middleware.

pub mod identity;
pub mod session;
