//! HTTP server
//!
//! Endpoints:
//! - GET /tap - count a visit and redirect to /
//! - GET /count - current count as JSON
//! - POST /github-webhook - signed GitHub deliveries, push to the production ref deploys
//! - GET /health - liveness and status summary
//! - GET /metrics - Prometheus metrics (when enabled)

pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod server;

pub use server::start_server;
