//! Common utilities and types for Burrow

pub mod config;
pub mod constants;
pub mod error;

pub use config::{ControlPlaneConfig, HeartbeatConfig, ProxyConfig, TlsConfig};
pub use constants::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_CONTROL_PORT, DEFAULT_IDLE_TIMEOUT_SECS,
    DEFAULT_PROXY_PORT, DEFAULT_RETRY_BUDGET,
};
pub use error::{Result, TunnelError};
