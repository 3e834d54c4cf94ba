//! Service layer between handlers and the core components.

pub mod auth;
pub mod cookies;
