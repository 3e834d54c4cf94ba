//! # f2f_core
//!
//! Identity, credential and authorization logic for Free2Free.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod oauth;
pub mod session;
pub mod store;
pub mod ttl;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
