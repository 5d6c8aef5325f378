//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Open the access log and build the upstream client
//! - Load TLS material and bind the listener
//! - Hand everything to the HTTPS server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::header::InvalidHeaderName;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::validation::parse_upstream;
use crate::config::{load_config, ConfigError, GateConfig, ValidationError};
use crate::http::HttpServer;
use crate::net::listener::bind;
use crate::net::tls::load_tls_config;
use crate::net::{ListenerError, TlsError};
use crate::observability::AccessLogger;
use crate::proxy::{ForwardError, Forwarder};

/// Anything that stops the gatekeeper from starting or keeps it from serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid upstream: {0}")]
    Upstream(#[from] ValidationError),

    #[error("failed to open access log {path:?}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build upstream client: {0}")]
    Client(#[from] ForwardError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("invalid header name: {0}")]
    HeaderName(#[from] InvalidHeaderName),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A fully prepared gatekeeper: config read, files opened, socket bound.
pub struct Gatekeeper {
    server: HttpServer,
    listener: std::net::TcpListener,
    tls: RustlsConfig,
    local_addr: SocketAddr,
}

impl Gatekeeper {
    /// Load the JSON configuration at `path` and prepare to serve it.
    pub fn from_config_file(path: &Path) -> Result<Self, StartupError> {
        let config = load_config(path)?;
        tracing::info!(path = ?path, "Configuration loaded");
        Self::prepare(config)
    }

    /// Prepare to serve an already loaded configuration.
    pub fn prepare(config: GateConfig) -> Result<Self, StartupError> {
        let upstream = parse_upstream(&config.upstream_address)?;

        let access_log =
            AccessLogger::open(&config.log_file).map_err(|source| StartupError::LogFile {
                path: config.log_file.clone(),
                source,
            })?;

        let forwarder = Forwarder::new(&upstream, config.timeouts.write())?;
        let tls = load_tls_config(Path::new(&config.cert_file), Path::new(&config.key_file))?;
        let listener = bind(&config.listen)?;
        let local_addr = listener.local_addr().map_err(StartupError::Serve)?;

        // The secret itself never reaches the diagnostics stream.
        tracing::info!(
            listen = %local_addr,
            upstream = %upstream,
            path = %config.allowed_path,
            header = %config.header_name,
            access_log = %config.log_file,
            "Gatekeeper ready"
        );

        let server = HttpServer::new(Arc::new(config), forwarder, Arc::new(access_log))?;

        Ok(Self {
            server,
            listener,
            tls,
            local_addr,
        })
    }

    /// Address actually bound, useful when the config asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
        self.server
            .serve_tls(self.listener, self.tls, shutdown)
            .await
            .map_err(StartupError::Serve)
    }
}
