//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → client_ip.rs (resolve originating address for the access log)
//!     → admission.rs (path + secret header equality gate)
//!     → Admit: forward upstream / Deny: fixed JSON 404
//! ```
//!
//! # Design Decisions
//! - Denials look identical regardless of which check failed
//! - The gate is a pure function of the request and immutable config

pub mod admission;
pub mod client_ip;

pub use admission::{AdmissionGate, Decision};
pub use client_ip::ClientAddr;
