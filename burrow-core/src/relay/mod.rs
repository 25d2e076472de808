//! Loopback relays
//!
//! A [`Relay`] listens on `127.0.0.1:<local_port>` and carries every
//! accepted connection to one exposed port of the proxy instance. Each
//! local connection gets its own freshly dialed, individually admitted
//! proxy connection. [`ControlRelay`] keeps the instance alive with
//! heartbeats.

use crate::auth::AuthToken;
use crate::control_plane::InstanceId;
use crate::transport::socket_tuning::configure_socket_silent;
use crate::transport::tcp::bind_loopback;
use crate::transport::Dialer;
use burrow_common::constants::{DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS};
use burrow_common::{Result, TunnelError};
use burrow_protocol::Transport;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod control;
pub mod handler;
pub mod handshake;
pub mod pump;

pub use control::ControlRelay;
pub use handler::{handle_connection, ConnectionContext};
pub use handshake::authenticate;

/// Settings of one relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub local_port: u16,
    /// Exposed proxy endpoint, `host:port`
    pub remote_addr: String,
    pub transport: Transport,
    pub auth_token: Option<AuthToken>,
    pub proxy_instance_id: Option<InstanceId>,
    /// Destination behind the proxy, for logs
    pub target: String,
    pub handshake_timeout: Duration,
    /// Bound on TCP connect plus TLS handshake with the proxy
    pub connect_timeout: Duration,
}

impl RelayConfig {
    pub fn new(local_port: u16, remote_addr: impl Into<String>) -> Self {
        let remote_addr = remote_addr.into();
        Self {
            local_port,
            target: remote_addr.clone(),
            remote_addr,
            transport: Transport::Tcp,
            auth_token: None,
            proxy_instance_id: None,
            handshake_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: AuthToken) -> Self {
        self.auth_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_instance(mut self, id: InstanceId) -> Self {
        self.proxy_instance_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

pub struct Relay {
    config: RelayConfig,
    dialer: Dialer,
}

impl Relay {
    pub fn new(config: RelayConfig, dialer: Dialer) -> Self {
        Self { config, dialer }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Binds the loopback listener without accepting yet.
    pub async fn bind(self) -> Result<BoundRelay> {
        if self.config.transport != Transport::Tcp {
            return Err(TunnelError::Config(format!(
                "{} relays are not supported",
                self.config.transport
            )));
        }

        let listener = bind_loopback(self.config.local_port).await.map_err(|e| {
            TunnelError::Config(format!(
                "cannot listen on 127.0.0.1:{}: {e}",
                self.config.local_port
            ))
        })?;
        let local_addr = listener.local_addr()?;
        debug!(
            local = %local_addr,
            remote = %self.config.remote_addr,
            instance = ?self.config.proxy_instance_id,
            "Relay bound"
        );

        Ok(BoundRelay {
            listener,
            local_addr,
            ctx: Arc::new(ConnectionContext {
                dialer: self.dialer,
                remote_addr: self.config.remote_addr,
                auth_token: self.config.auth_token,
                handshake_timeout: self.config.handshake_timeout,
                connect_timeout: self.config.connect_timeout,
                target: self.config.target,
            }),
        })
    }

    /// Binds and serves until `shutdown` fires. Non-TCP relays are skipped.
    pub async fn up(self, shutdown: CancellationToken) -> Result<()> {
        if self.config.transport != Transport::Tcp {
            warn!(
                local_port = self.config.local_port,
                target_addr = %self.config.target,
                "Skipping {} forward, only TCP is relayed",
                self.config.transport
            );
            return Ok(());
        }
        self.bind().await?.serve(shutdown).await
    }
}

/// A relay whose listener is open
pub struct BoundRelay {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: Arc<ConnectionContext>,
}

impl BoundRelay {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts until `shutdown` fires, one task per connection.
    ///
    /// Returning closes the listener; connections still in flight are
    /// expired through child tokens of `shutdown`.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        info!(local = %self.local_addr, target_addr = %self.ctx.target, "Relay accepting");

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(local = %self.local_addr, "Relay listener closed");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted?,
            };

            configure_socket_silent(&stream);
            debug!(%peer, local = %self.local_addr, "Accepted local connection");

            let ctx = Arc::clone(&self.ctx);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, Arc::clone(&ctx), shutdown).await {
                    handler::report_connection_error(&ctx.target, &e);
                }
            });
        }
    }
}
