//! Domain models shared across `f2f_core` and `f2f_api`.

pub mod auth;
