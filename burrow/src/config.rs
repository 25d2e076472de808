//! Configuration types for embedding a Burrow session.

use burrow_common::{HeartbeatConfig, ProxyConfig, Result, TunnelError};
use burrow_core::control_plane::InstanceId;
use burrow_core::TransportConfig;
use std::fmt;
use std::net::SocketAddr;

/// Everything a [`Session`](crate::Session) needs besides the control plane.
///
/// Use [`SessionBuilder`](crate::SessionBuilder) for ergonomic construction.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Forward specifications, `[localPort:]target:remotePort[/proto]`
    pub forwards: Vec<String>,

    /// Proxy instance settings
    pub proxy: ProxyConfig,

    /// How relays reach the proxy
    pub transport: TransportConfig,

    /// Control connection heartbeat
    pub heartbeat: HeartbeatConfig,
}

impl SessionConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.forwards.is_empty() {
            return Err(TunnelError::Config("at least one forward is required".into()));
        }
        if self.proxy.proxy_ports.is_empty() {
            return Err(TunnelError::Config("proxy_ports must not be empty".into()));
        }
        if self.proxy.control_port == 0 {
            return Err(TunnelError::Config("control_port must not be 0".into()));
        }
        if self.proxy.auth_timeout.as_secs() == 0 {
            return Err(TunnelError::Config(
                "auth_timeout must be at least one second".into(),
            ));
        }
        if self.proxy.connect_timeout.is_zero() {
            return Err(TunnelError::Config("connect_timeout must not be 0".into()));
        }
        if self.proxy.ready_poll_interval.is_zero() {
            return Err(TunnelError::Config(
                "ready_poll_interval must not be 0".into(),
            ));
        }
        if self.heartbeat.interval.is_zero() {
            return Err(TunnelError::Config(
                "heartbeat interval must not be 0".into(),
            ));
        }
        if self.proxy.idle_timeout <= self.heartbeat.interval {
            return Err(TunnelError::Config(format!(
                "idle_timeout ({:?}) must exceed the heartbeat interval ({:?})",
                self.proxy.idle_timeout, self.heartbeat.interval
            )));
        }
        if self.proxy.image.is_empty() {
            return Err(TunnelError::Config("proxy image is required".into()));
        }
        Ok(())
    }
}

/// One live forward
#[derive(Debug, Clone)]
pub struct ForwardInfo {
    pub local_addr: SocketAddr,
    /// Target as given on the command line
    pub target: String,
    /// Address the target resolved to
    pub address: String,
    pub remote_port: u16,
    /// `fqdn:port` of the proxy endpoint carrying this forward
    pub via: String,
}

impl fmt::Display for ForwardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}:{} via {}",
            self.local_addr, self.target, self.remote_port, self.via
        )
    }
}

/// Details of a session once it is accepting connections.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub instance_id: InstanceId,
    pub fqdn: String,
    pub forwards: Vec<ForwardInfo>,
}
