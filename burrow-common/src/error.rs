//! Error types for Burrow

use std::io::ErrorKind;
use thiserror::Error;

/// Main error type for Burrow operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed forward specification
    #[error("Invalid forward spec '{spec}': {reason}")]
    Parse { spec: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more instances could not be resolved
    #[error("Instances not found: {}", .0.join(", "))]
    NotFound(Vec<String>),

    /// The proxy has no spare backend connection for this client
    #[error("No backend connection available on the proxy, try again later")]
    NoCapacity,

    /// The proxy reported an internal failure during the handshake
    #[error("Proxy internal error: {0} (check the proxy instance logs)")]
    RemoteInternal(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Control-plane API error
    #[error("Control plane error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ControlPlane {
        status: Option<u16>,
        message: String,
    },

    /// Control relay stopped sending heartbeats
    #[error("Heartbeat failed: {0}")]
    Heartbeat(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TunnelError>;

impl TunnelError {
    /// Shorthand for a parse error on `spec`.
    pub fn parse(spec: &str, reason: impl Into<String>) -> Self {
        TunnelError::Parse {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation later can succeed.
    ///
    /// Only admission rejections are retryable; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TunnelError::NoCapacity)
    }

    /// Whether this is an expected side effect of cancellation or peer close.
    pub fn is_benign(&self) -> bool {
        match self {
            TunnelError::Io(e) => is_benign_io(e),
            TunnelError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Classifies transport errors produced by cancellation or by the peer going away.
pub fn is_benign_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
            | ErrorKind::Interrupted
    )
}
