//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Upstream must be an absolute http(s) URL with a host
//! - Required paths must be present
//! - Header name and listen address must parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - File existence is checked where the files are opened, not here

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GateConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Missing { field: &'static str },

    #[error("RpAddr {value:?} is not a valid upstream URL: {reason}")]
    UpstreamAddress { value: String, reason: String },

    #[error("HeaderName {0:?} is not a valid HTTP header name")]
    HeaderName(String),

    #[error("Listen {0:?} is not a valid socket address")]
    Listen(String),

    #[error("timeout {field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

/// Parse and check the upstream URL.
pub fn parse_upstream(value: &str) -> Result<Url, ValidationError> {
    let invalid = |reason: &str| ValidationError::UpstreamAddress {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(value).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// Validate a decoded configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("CertFile", &config.cert_file),
        ("KeyFile", &config.key_file),
        ("LogFile", &config.log_file),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::Missing { field });
        }
    }

    if let Err(e) = parse_upstream(&config.upstream_address) {
        errors.push(e);
    }

    if HeaderName::from_bytes(config.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::HeaderName(config.header_name.clone()));
    }

    if config.listen.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Listen(config.listen.clone()));
    }

    for (field, secs) in [
        ("ReadSecs", config.timeouts.read_secs),
        ("WriteSecs", config.timeouts.write_secs),
        ("IdleSecs", config.timeouts.idle_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
