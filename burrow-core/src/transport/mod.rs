//! Transport layer for connections to the proxy
//!
//! Relays dial the proxy through a [`Dialer`] built once from a
//! [`TransportConfig`]. TLS is the production transport; plain TCP exists for
//! local development against a proxy without TLS termination.

use burrow_common::TlsConfig;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod socket_tuning;
pub mod tcp;
pub mod tls;

pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub type BoxedStream = Pin<Box<dyn AsyncStream>>;

/// Transport selection for connections to the proxy.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    Tcp,
    Tls(TlsConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Tls(TlsConfig::default())
    }
}

/// Connects to the proxy with a transport prepared once per session.
#[derive(Clone)]
pub enum Dialer {
    Tcp,
    Tls(tls::TlsDialer),
}

impl Dialer {
    pub fn new(config: &TransportConfig) -> io::Result<Self> {
        match config {
            TransportConfig::Tcp => Ok(Dialer::Tcp),
            TransportConfig::Tls(tls_config) => Ok(Dialer::Tls(tls::TlsDialer::new(tls_config)?)),
        }
    }

    pub async fn connect(&self, addr: &str) -> io::Result<BoxedStream> {
        match self {
            Dialer::Tcp => tcp::connect(addr).await,
            Dialer::Tls(dialer) => dialer.connect(addr).await,
        }
    }

    /// [`connect`](Self::connect) bounded by `limit`, TLS handshake included.
    ///
    /// A peer that accepts TCP but never answers the handshake fails with
    /// [`io::ErrorKind::TimedOut`].
    pub async fn connect_within(&self, addr: &str, limit: Duration) -> io::Result<BoxedStream> {
        tokio::time::timeout(limit, self.connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no connection to {addr} within {limit:?}"),
                )
            })?
    }
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialer::Tcp => f.write_str("Dialer::Tcp"),
            Dialer::Tls(_) => f.write_str("Dialer::Tls"),
        }
    }
}
