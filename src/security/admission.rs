//! Admission gate.
//!
//! # Responsibilities
//! - Decide whether a request may reach the upstream
//!
//! # Design Decisions
//! - Exact, case-sensitive comparisons; no prefix or wildcard matching
//! - Header value compared in constant time
//! - The gate never touches the response; it returns a [`Decision`]

use subtle::ConstantTimeEq;

use crate::config::GateConfig;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Deny,
}

/// Equality gate over the request path and the secret header value.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    allowed_path: String,
    required_value: String,
}

impl AdmissionGate {
    pub fn new(allowed_path: impl Into<String>, required_value: impl Into<String>) -> Self {
        Self {
            allowed_path: allowed_path.into(),
            required_value: required_value.into(),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.allowed_path, &config.required_header_value)
    }

    /// True iff both the path and the header value match exactly.
    pub fn admit(&self, path: &str, header_value: &str) -> bool {
        // Both checks always run.
        let value_ok: bool = header_value
            .as_bytes()
            .ct_eq(self.required_value.as_bytes())
            .into();
        let path_ok = path == self.allowed_path;
        value_ok & path_ok
    }

    pub fn evaluate(&self, path: &str, header_value: &str) -> Decision {
        if self.admit(path, header_value) {
            Decision::Admit
        } else {
            Decision::Deny
        }
    }
}
