//! Axum middleware for the pulsegrid API.

pub mod auth;

pub use auth::{api_key_middleware, AuthMiddlewareState};
