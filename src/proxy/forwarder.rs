//! Single-upstream reverse proxy.
//!
//! # Responsibilities
//! - Rewrite scheme, authority and path onto the configured upstream
//! - Strip hop-by-hop headers in both directions
//! - Stream request and response bodies without buffering
//! - Relay HTTP/1.1 protocol upgrades (e.g. WebSocket) byte for byte
//! - Map transport failures to 502 and a silent upstream to 504

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};
use rustls::{crypto::CryptoProvider, ClientConfig, RootCertStore};
use thiserror::Error;
use url::Url;

/// Headers that describe a single connection and are never forwarded.
static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Error building the forwarder.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream {0:?} has no usable authority")]
    Authority(String),

    #[error("failed to load native root certificates: {0}")]
    Roots(#[source] std::io::Error),

    #[error("failed to build upstream TLS client: {0}")]
    Tls(#[from] rustls::Error),
}

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Forwards admitted requests to the single upstream.
#[derive(Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
    response_timeout: Duration,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("scheme", &self.scheme)
            .field("authority", &self.authority)
            .field("base_path", &self.base_path)
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl Forwarder {
    /// Build a forwarder bound to `upstream`. Called once at startup.
    ///
    /// `response_timeout` bounds the wait for the upstream's response head.
    pub fn new(upstream: &Url, response_timeout: Duration) -> Result<Self, ForwardError> {
        let host = upstream
            .host_str()
            .ok_or_else(|| ForwardError::Authority(upstream.to_string()))?;
        let authority = match upstream.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::try_from(authority.as_str())
            .map_err(|_| ForwardError::Authority(upstream.to_string()))?;
        let scheme = if upstream.scheme() == "https" {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        };

        let connector = build_connector(&scheme)?;
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            scheme,
            authority,
            base_path: upstream.path().to_string(),
            base_query: upstream.query().map(str::to_string),
            response_timeout,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Map an inbound request URI onto the upstream.
    pub fn target_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path = join_path(&self.base_path, uri.path());
        let query = match (self.base_query.as_deref(), uri.query()) {
            (Some(base), Some(q)) if !base.is_empty() && !q.is_empty() => {
                Some(format!("{base}&{q}"))
            }
            (Some(base), Some(q)) => Some(format!("{base}{q}")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        };
        let path_and_query = match query {
            Some(q) => format!("{path}?{q}"),
            None => path,
        };

        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::try_from(path_and_query)?)
            .build()?)
    }

    /// Forward `request` and relay the upstream response.
    pub async fn forward(&self, mut request: Request<Body>, peer: SocketAddr) -> Response {
        let upgrade = if request.version() == Version::HTTP_11 {
            upgrade_protocol(request.headers())
        } else {
            None
        };
        let inbound_upgrade = upgrade.as_ref().map(|_| hyper::upgrade::on(&mut request));

        let (mut parts, body) = request.into_parts();

        parts.uri = match self.target_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build upstream URI");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(protocol) = upgrade {
            parts
                .headers
                .insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
            parts.headers.insert(header::UPGRADE, protocol);
        }
        append_forwarded_for(&mut parts.headers, peer);
        if let Ok(host) = HeaderValue::from_str(self.authority.as_str()) {
            parts.headers.insert(header::HOST, host);
        }

        let method = parts.method.clone();
        let target = parts.uri.clone();
        let pending = self.client.request(Request::from_parts(parts, body));
        let response = match tokio::time::timeout(self.response_timeout, pending).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(method = %method, upstream = %target, error = %e, "Upstream request failed");
                return StatusCode::BAD_GATEWAY.into_response();
            }
            Err(_) => {
                tracing::error!(
                    method = %method,
                    upstream = %target,
                    timeout = ?self.response_timeout,
                    "Upstream did not respond in time"
                );
                return StatusCode::GATEWAY_TIMEOUT.into_response();
            }
        };

        tracing::debug!(method = %method, upstream = %target, status = %response.status(), "Upstream responded");

        match inbound_upgrade {
            Some(inbound) if response.status() == StatusCode::SWITCHING_PROTOCOLS => {
                relay_upgrade(response, inbound)
            }
            _ => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
        }
    }
}

/// The `Upgrade` value if the request asks to switch protocols.
fn upgrade_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    if wants_upgrade {
        headers.get(header::UPGRADE).cloned()
    } else {
        None
    }
}

/// Answer the client with the upstream's 101 and splice the two upgraded
/// connections together once both sides have switched.
fn relay_upgrade(mut response: hyper::Response<Incoming>, inbound: OnUpgrade) -> Response {
    let outbound = hyper::upgrade::on(&mut response);

    tokio::spawn(async move {
        match tokio::try_join!(inbound, outbound) {
            Ok((client, upstream)) => {
                let mut client = TokioIo::new(client);
                let mut upstream = TokioIo::new(upstream);
                match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
                    Ok((sent, received)) => {
                        tracing::debug!(sent, received, "Upgraded connection closed");
                    }
                    Err(e) => tracing::debug!(error = %e, "Upgraded connection ended"),
                }
            }
            Err(e) => tracing::error!(error = %e, "Protocol upgrade failed"),
        }
    });

    let (mut parts, _) = response.into_parts();
    let protocol = parts.headers.get(header::UPGRADE).cloned();
    strip_hop_by_hop(&mut parts.headers);
    parts
        .headers
        .insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    if let Some(protocol) = protocol {
        parts.headers.insert(header::UPGRADE, protocol);
    }
    Response::from_parts(parts, Body::empty())
}

fn build_connector(scheme: &Scheme) -> Result<HttpsConnector<HttpConnector>, ForwardError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = HttpsConnectorBuilder::new();

    // Native roots are only required when the upstream itself speaks TLS.
    let builder = if *scheme == Scheme::HTTPS {
        builder
            .with_provider_and_native_roots(provider)
            .map_err(ForwardError::Roots)?
    } else {
        builder.with_tls_config(plain_client_config(provider)?)
    };

    Ok(builder.https_or_http().enable_http1().build())
}

fn plain_client_config(provider: Arc<CryptoProvider>) -> Result<ClientConfig, rustls::Error> {
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(RootCertStore::empty())
        .with_no_client_auth())
}

/// Join two path segments with exactly one slash between them.
fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in Connection are connection-scoped too.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{prior}, {ip}"),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
