//! Configuration schema definitions.
//!
//! The on-disk format is a flat JSON object with PascalCase keys. Every field
//! is optional at the decoding stage; missing strings decode to empty and are
//! rejected later by validation where emptiness is not meaningful.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the shared secret when `HeaderName` is not configured.
pub const DEFAULT_HEADER_NAME: &str = "x-flag";

/// Address bound when `Listen` is not configured.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:443";

/// Root configuration for the gatekeeper.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    /// Path to the PEM certificate chain.
    #[serde(rename = "CertFile")]
    pub cert_file: String,

    /// Path to the PEM private key.
    #[serde(rename = "KeyFile")]
    pub key_file: String,

    /// Path of the append-only access log.
    #[serde(rename = "LogFile")]
    pub log_file: String,

    /// Absolute URL of the single upstream.
    #[serde(rename = "RpAddr")]
    pub upstream_address: String,

    /// Exact request path that may reach the upstream.
    #[serde(rename = "RpPath")]
    pub allowed_path: String,

    /// Secret value the inbound header must carry.
    #[serde(rename = "CfHeader")]
    pub required_header_value: String,

    /// Name of the header holding the secret.
    #[serde(rename = "HeaderName")]
    pub header_name: String,

    /// Socket address to listen on.
    #[serde(rename = "Listen")]
    pub listen: String,

    /// Connection timeouts.
    #[serde(rename = "Timeouts")]
    pub timeouts: TimeoutConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cert_file: String::new(),
            key_file: String::new(),
            log_file: String::new(),
            upstream_address: String::new(),
            allowed_path: String::new(),
            required_header_value: String::new(),
            header_name: DEFAULT_HEADER_NAME.to_string(),
            listen: DEFAULT_LISTEN_ADDRESS.to_string(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Timeout configuration for inbound connections.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to read request headers, and between request body frames.
    #[serde(rename = "ReadSecs")]
    pub read_secs: u64,

    /// Time allowed to produce a response once the request has been read.
    #[serde(rename = "WriteSecs")]
    pub write_secs: u64,

    /// Time a connection may sit without any traffic before it is closed.
    #[serde(rename = "IdleSecs")]
    pub idle_secs: u64,
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 5,
            write_secs: 10,
            idle_secs: 120,
        }
    }
}
