//! Default ports, timeouts and limits for Burrow.
//!
//! Use these constants instead of magic numbers so defaults stay consistent
//! across the core library, the session facade and the CLI.

/// Base port of the proxy's public service group. One port per forward is
/// allocated by counting up from here.
pub const DEFAULT_PROXY_PORT: u16 = 4444;

/// Port of the TLS service carrying the control/heartbeat connection.
pub const DEFAULT_CONTROL_PORT: u16 = 4443;

/// Seconds the proxy waits for a client to present its auth token.
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

/// Seconds without a heartbeat after which the proxy shuts itself down.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Dial attempts the proxy makes against a private target before giving up.
pub const DEFAULT_RETRY_BUDGET: u32 = 27;

/// Interval between heartbeat frames on the control connection.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 60;

/// Upper bound on waiting for a freshly created proxy instance to become ready.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 5;

/// Upper bound on dialing the proxy, TCP connect plus TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the proxy instance.
pub const DEFAULT_READY_POLL_MILLIS: u64 = 250;

/// Per-direction copy buffer for relayed connections (32 KiB).
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Length of the per-session auth token.
pub const AUTH_TOKEN_LEN: usize = 32;

/// Image the proxy instance runs.
pub const DEFAULT_PROXY_IMAGE: &str = "burrow/tcp-proxy:stable";

/// Domain suffixes that already denote a private address and need no lookup.
pub const PRIVATE_DOMAIN_SUFFIXES: &[&str] = &[".internal", ".private", ".local"];

/// Default control-plane API endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.burrow.dev";
