//! Configuration types for Burrow tunnel sessions

use crate::constants::{
    DEFAULT_API_ENDPOINT, DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_CONTROL_PORT, DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PROXY_IMAGE,
    DEFAULT_PROXY_PORT, DEFAULT_READY_POLL_MILLIS, DEFAULT_READY_TIMEOUT_SECS,
    DEFAULT_RETRY_BUDGET,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Proxy instance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Image the proxy instance runs
    pub image: String,
    /// Exposed proxy ports: one per forward, or a single base port
    pub proxy_ports: Vec<u16>,
    /// Port of the control/heartbeat service
    pub control_port: u16,
    /// How long the proxy waits for the auth token on a new connection
    pub auth_timeout: Duration,
    /// How long the proxy survives without heartbeats
    pub idle_timeout: Duration,
    /// Dial attempts the proxy makes against each private target
    pub retry_budget: u32,
    /// Upper bound on waiting for the instance to become ready
    pub ready_timeout: Duration,
    /// Poll interval while waiting for readiness
    pub ready_poll_interval: Duration,
    /// Upper bound on dialing the proxy, TCP connect plus TLS handshake
    pub connect_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_PROXY_IMAGE.to_string(),
            proxy_ports: vec![DEFAULT_PROXY_PORT],
            control_port: DEFAULT_CONTROL_PORT,
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            retry_budget: DEFAULT_RETRY_BUDGET,
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            ready_poll_interval: Duration::from_millis(DEFAULT_READY_POLL_MILLIS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// TLS configuration for connections to the proxy
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsConfig {
    /// Path to a CA certificate to trust instead of the webpki roots
    pub ca_cert_path: Option<PathBuf>,
    /// Server name for SNI, defaults to the host part of the address
    pub server_name: Option<String>,
    /// Skip certificate verification (self-signed development proxies only)
    pub skip_verify: bool,
}

/// Heartbeat configuration for the control relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Interval between heartbeat frames
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
        }
    }
}

/// Control-plane API credentials and endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Base URL of the API
    pub endpoint: String,
    /// Bearer token
    pub api_token: Option<String>,
    /// Project that owns the proxy instance and the targets
    pub project: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_token: None,
            project: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.proxy_ports, vec![4444]);
        assert_eq!(config.control_port, 4443);
        assert_eq!(config.retry_budget, 27);
        assert_eq!(config.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_heartbeat_default_interval() {
        assert_eq!(HeartbeatConfig::default().interval, Duration::from_secs(60));
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = TlsConfig {
            ca_cert_path: Some(PathBuf::from("/etc/burrow/ca.pem")),
            server_name: Some("proxy.example.com".into()),
            skip_verify: false,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: TlsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server_name.as_deref(), Some("proxy.example.com"));
    }
}
