//! Listening socket setup.
//!
//! The socket is bound eagerly during startup so that a port conflict or a
//! missing privilege is reported before anything is served.

use std::net::{SocketAddr, TcpListener};

use thiserror::Error;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid listen address {0:?}")]
    Address(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind a non-blocking listener suitable for handing to the async server.
pub fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| ListenerError::Address(address.to_string()))?;

    let listener = TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ListenerError::Bind { addr, source })?;

    tracing::debug!(address = %addr, "Listener bound");
    Ok(listener)
}
