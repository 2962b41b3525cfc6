//! HTTP middleware for the webhook route

pub mod auth;

pub use auth::webhook_auth_middleware;
