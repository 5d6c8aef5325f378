//! Per-request view used for logging and admission.
//!
//! # Responsibilities
//! - Extract the request URI, user agent and secret header value
//! - Resolve the client address
//!
//! # Design Decisions
//! - Absent headers read as empty strings
//! - Non-UTF-8 header bytes are decoded lossily; they can never equal a configured secret

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, Request};

use crate::observability::AccessRecord;
use crate::security::ClientAddr;

/// The fields of an inbound request the gatekeeper cares about.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub remote_addr: SocketAddr,
    pub client: ClientAddr,
    pub request_uri: String,
    pub user_agent: String,
    pub header_value: String,
}

impl InboundRequest {
    pub fn from_request<B>(request: &Request<B>, secret_header: &HeaderName, peer: SocketAddr) -> Self {
        let headers = request.headers();
        let uri = request.uri();

        Self {
            remote_addr: peer,
            client: ClientAddr::resolve(headers, peer),
            request_uri: uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| uri.to_string()),
            user_agent: header_string(headers, &header::USER_AGENT),
            header_value: header_string(headers, secret_header),
        }
    }

    pub fn access_record(&self) -> AccessRecord<'_> {
        AccessRecord {
            remote_addr: self.remote_addr,
            request_uri: &self.request_uri,
            user_agent: &self.user_agent,
            header_value: &self.header_value,
            client: self.client,
        }
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}
