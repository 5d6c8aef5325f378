//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection
//!     → server.rs (Axum setup, HTTP/1.1 + HTTP/2, timeouts)
//!     → request.rs (inbound view: uri, user agent, secret header, client addr)
//!     → access log line
//!     → admission gate
//!     → forwarder (admit) / response.rs fixed 404 (deny)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::InboundRequest;
pub use response::{not_found, NOT_FOUND_BODY};
pub use server::{AppState, HttpServer};
