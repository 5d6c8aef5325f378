//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (socket bound at startup)
//!     → connection.rs (idle-timeout wrapper)
//!     → tls.rs (hardened rustls handshake, ALPN h2 / http/1.1)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bind failures surface during startup, not on first accept
//! - TLS is mandatory; there is no plaintext listener
//! - Idle connections are closed below the TLS layer

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{IdleTimeoutAcceptor, IdleTimeoutStream};
pub use listener::ListenerError;
pub use tls::TlsError;
