//! # askdesk_core
//!
//! Core domain logic for Askdesk.
//!
//! Talks to a remote serving endpoint whose request and response schema is
//! not under our control. An ordered chain of wire strategies gets a reply
//! out of the endpoint and a permissive normalizer turns it into text; the
//! chat session controller drives both for each browser session.

pub mod adapter;
pub mod capability;
pub mod config;
pub mod control_plane;
pub mod message;
pub mod normalize;
pub mod probe;
pub mod session;
pub mod strategy;
pub mod transport;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
