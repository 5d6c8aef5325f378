//! TLS-terminating gatekeeper.
//!
//! Accepts HTTPS, writes one access-log line per request, and forwards a
//! request to the single configured upstream only when its path is exactly
//! the allowed path and its secret header carries the expected value.
//! Everything else receives the same JSON 404.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──TLS──▶ net (listener, tls, idle timeout)
//!                     │
//!                     ▼
//!                   http::server ──▶ observability::access_log
//!                     │
//!                     ▼
//!                   security::admission
//!                     │ admit                 │ deny
//!                     ▼                       ▼
//!                   proxy::forwarder        http::response (404)
//!                     │
//!                     ▼
//!                   Upstream
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod security;

pub use config::GateConfig;
pub use http::HttpServer;
pub use lifecycle::{Gatekeeper, Shutdown, StartupError};
