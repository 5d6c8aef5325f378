//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request
//!     → forwarder.rs (rewrite URI/Host, strip hop-by-hop, append X-Forwarded-For)
//!     → hyper client (http or https upstream)
//!     → upstream response streamed back unmodified (minus hop-by-hop)
//! ```
//!
//! # Design Decisions
//! - One forwarder, built once at startup, cloned into request state
//! - Bodies stream in both directions; nothing is buffered
//! - Transport failures surface as 502

pub mod forwarder;

pub use forwarder::{ForwardError, Forwarder};
