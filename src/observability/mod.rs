//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → access_log.rs (one pipe-delimited line in the access log file)
//!
//! Everything else:
//!     → logging.rs (tracing events to stderr, filtered by RUST_LOG)
//! ```
//!
//! # Design Decisions
//! - Access log and diagnostics are separate sinks
//! - Access log failures never fail a request

pub mod access_log;
pub mod logging;

pub use access_log::{AccessLogger, AccessRecord};
pub use logging::init_logging;
