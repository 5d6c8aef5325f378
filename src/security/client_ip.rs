//! Client address resolution.
//!
//! Behind a CDN the socket peer is the CDN edge, so forwarding headers are
//! consulted first. Only public addresses are accepted from headers; anything
//! private or unparseable falls through to the next source.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

/// Headers consulted, in order, for the originating client address.
pub const FORWARDING_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

/// Resolved client address. Forwarded addresses carry no port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr {
    pub ip: IpAddr,
    pub port: Option<u16>,
}

impl ClientAddr {
    pub fn resolve(headers: &HeaderMap, peer: SocketAddr) -> Self {
        FORWARDING_HEADERS
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
            .find(is_public)
            .map(|ip| Self { ip, port: None })
            .unwrap_or(Self {
                ip: peer.ip(),
                port: Some(peer.port()),
            })
    }
}

/// `ip:port`, unbracketed, with `-` standing in for an unknown port.
impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.ip, port),
            None => write!(f, "{}:-", self.ip),
        }
    }
}

fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let unique_local = (v6.segments()[0] & 0xfe00) == 0xfc00;
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}
