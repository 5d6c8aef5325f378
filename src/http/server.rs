//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the gate handler
//! - Wire up middleware (tracing, body read/write timeouts)
//! - Serve HTTP/1.1 and HTTP/2 over TLS
//! - Log, gate, and forward or deny every request

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::InvalidHeaderName, HeaderName, Request},
    response::Response,
    Router,
};
use axum_server::{
    tls_rustls::{RustlsAcceptor, RustlsConfig},
    Handle,
};
use hyper_util::rt::TokioTimer;
use tokio::sync::broadcast;
use tower_http::{
    timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer},
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::request::InboundRequest;
use crate::http::response::not_found;
use crate::net::IdleTimeoutAcceptor;
use crate::observability::AccessLogger;
use crate::proxy::Forwarder;
use crate::security::{AdmissionGate, Decision};

/// How long in-flight requests may drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    pub forwarder: Forwarder,
    pub access_log: Arc<AccessLogger>,
    pub secret_header: HeaderName,
}

/// HTTPS server for the gatekeeper.
pub struct HttpServer {
    router: Router,
    config: Arc<GateConfig>,
}

impl HttpServer {
    /// Create a new server from the immutable configuration and its collaborators.
    pub fn new(
        config: Arc<GateConfig>,
        forwarder: Forwarder,
        access_log: Arc<AccessLogger>,
    ) -> Result<Self, InvalidHeaderName> {
        let state = AppState {
            gate: Arc::new(AdmissionGate::from_config(&config)),
            forwarder,
            access_log,
            secret_header: HeaderName::from_bytes(config.header_name.as_bytes())?,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// A stalled body in either direction aborts the connection; the wait for
    /// the upstream's response head is bounded by the forwarder.
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        let timeouts = &config.timeouts;
        Router::new()
            .fallback(gate_handler)
            .with_state(state)
            .layer(RequestBodyTimeoutLayer::new(timeouts.read()))
            .layer(ResponseBodyTimeoutLayer::new(timeouts.write()))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve TLS on `listener` until `shutdown` fires.
    ///
    /// Dropping the sender side of `shutdown` also stops the server.
    pub async fn serve_tls(
        self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let timeouts = self.config.timeouts.clone();

        let handle = Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        let acceptor = RustlsAcceptor::new(tls)
            .handshake_timeout(timeouts.read())
            .acceptor(IdleTimeoutAcceptor::new(timeouts.idle()));

        let mut server = axum_server::from_tcp(listener)
            .acceptor(acceptor)
            .handle(handle);
        server
            .http_builder()
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(timeouts.read());
        server.http_builder().http2().timer(TokioTimer::new());

        tracing::info!(
            address = %addr,
            read_timeout = ?timeouts.read(),
            write_timeout = ?timeouts.write(),
            idle_timeout = ?timeouts.idle(),
            "HTTPS server starting"
        );

        server
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Log the request, then forward it or answer with the fixed 404.
async fn gate_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let inbound = InboundRequest::from_request(&request, &state.secret_header, peer);
    state.access_log.record(&inbound.access_record()).await;

    match state.gate.evaluate(request.uri().path(), &inbound.header_value) {
        Decision::Admit => {
            tracing::debug!(
                method = %request.method(),
                uri = %inbound.request_uri,
                client = %inbound.client,
                "Request admitted"
            );
            state.forwarder.forward(request, peer).await
        }
        Decision::Deny => {
            tracing::debug!(
                method = %request.method(),
                uri = %inbound.request_uri,
                client = %inbound.client,
                "Request denied"
            );
            not_found()
        }
    }
}
