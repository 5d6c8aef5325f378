//! Diagnostic logging.
//!
//! Diagnostics (startup, upstream errors, access-log failures) go through
//! `tracing` to stderr. The per-request access log is a separate file written
//! by [`crate::observability::access_log`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "gatekeeper=info,tower_http=info";

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
