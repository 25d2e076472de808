//! Tunnel subcommand implementation

use anyhow::{Context, Result};
use burrow::common::constants::{
    DEFAULT_API_ENDPOINT, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HEARTBEAT_INTERVAL_SECS,
    DEFAULT_PROXY_IMAGE, DEFAULT_READY_TIMEOUT_SECS,
};
use burrow::common::{
    ControlPlaneConfig, TlsConfig, DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_CONTROL_PORT,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PROXY_PORT, DEFAULT_RETRY_BUDGET,
};
use burrow::Session;
use burrow_observability::{init_observability, shutdown_tracing, ObservabilityOptions};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// TLS flags (flattened into TunnelArgs)
#[derive(Args, Debug)]
pub struct TlsArgs {
    /// Path to a CA certificate (PEM) to trust for the proxy instead of the system roots
    #[arg(long, env = "BURROW_TLS_CA")]
    tls_ca: Option<PathBuf>,

    /// Server name (SNI) override for the proxy
    #[arg(long, env = "BURROW_TLS_SERVER_NAME")]
    tls_server_name: Option<String>,

    /// Skip TLS certificate verification (insecure, for self-signed development proxies)
    #[arg(long, env = "BURROW_TLS_SKIP_VERIFY")]
    tls_skip_verify: bool,

    /// Connect to the proxy without TLS (local development only)
    #[arg(long, conflicts_with_all = ["tls_ca", "tls_skip_verify"])]
    plaintext: bool,
}

/// Observability flags (flattened into TunnelArgs)
#[derive(Args, Debug)]
pub struct ObservabilityArgs {
    /// Export spans over OTLP (endpoint from OTEL_EXPORTER_OTLP_ENDPOINT)
    #[arg(long, env = "BURROW_OBSERVABILITY")]
    observability: bool,

    /// Record relay metrics and log a snapshot on exit
    #[arg(long, env = "BURROW_METRICS")]
    metrics: bool,

    /// Log JSON lines
    #[arg(long, env = "BURROW_LOG_JSON")]
    log_json: bool,
}

#[derive(Args, Debug)]
pub struct TunnelArgs {
    /// Forwards, `[localPort:]target:remotePort[/proto]`. The target is an
    /// instance name, UUID, private IP or private FQDN.
    #[arg(required = true, value_name = "FORWARD")]
    forwards: Vec<String>,

    /// Control-plane API endpoint
    #[arg(long, default_value = DEFAULT_API_ENDPOINT, env = "BURROW_API_URL")]
    api_url: String,

    /// API token. If omitted, uses BURROW_API_TOKEN, or prompts securely.
    #[arg(long, env = "BURROW_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Project owning the proxy instance and the targets
    #[arg(long, env = "BURROW_PROJECT")]
    project: Option<String>,

    /// Exposed proxy ports: one per forward, or a single base port
    #[arg(long = "proxy-port", value_delimiter = ',', default_values_t = [DEFAULT_PROXY_PORT])]
    proxy_ports: Vec<u16>,

    /// Proxy control (heartbeat) port
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Proxy image
    #[arg(long, default_value = DEFAULT_PROXY_IMAGE, env = "BURROW_PROXY_IMAGE")]
    image: String,

    /// Seconds the proxy waits for a connection's auth token
    #[arg(long, default_value_t = DEFAULT_AUTH_TIMEOUT_SECS)]
    auth_timeout: u64,

    /// Seconds the proxy survives without heartbeats
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    idle_timeout: u64,

    /// Dial attempts the proxy makes against each target
    #[arg(long, default_value_t = DEFAULT_RETRY_BUDGET)]
    retry_budget: u32,

    /// Seconds to wait for the proxy instance to become ready
    #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
    ready_timeout: u64,

    /// Seconds allowed for reaching the proxy, TLS handshake included
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout: u64,

    /// Seconds between heartbeats
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL_SECS)]
    heartbeat_interval: u64,

    #[command(flatten)]
    tls: TlsArgs,

    #[command(flatten)]
    observability: ObservabilityArgs,
}

/// Resolve the API token from args, then env, then secure prompt.
fn resolve_api_token(args: &TunnelArgs) -> Result<String> {
    if let Some(ref t) = args.api_token {
        return Ok(t.clone());
    }
    prompt_token()
}

/// Prompt for the token on TTY without echoing (secure input).
fn prompt_token() -> Result<String> {
    rpassword::prompt_password("API token: ").context(
        "Could not read token from terminal (is stdin a TTY?). Set BURROW_API_TOKEN or pass --api-token",
    )
}

impl From<&ObservabilityArgs> for ObservabilityOptions {
    fn from(args: &ObservabilityArgs) -> Self {
        Self {
            otlp: args.observability,
            metrics: args.metrics,
            json: args.log_json,
        }
    }
}

/// Cancels `shutdown` once `signal` fires. A signal that cannot be
/// installed is logged and leaves the session running.
async fn cancel_on_interrupt<F>(signal: F, shutdown: CancellationToken)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Interrupt received, tearing down");
            shutdown.cancel();
        }
        Err(e) => error!("Cannot listen for Ctrl+C: {e}"),
    }
}

pub async fn run(args: TunnelArgs) -> Result<()> {
    init_observability("burrow", &(&args.observability).into());
    info!("Starting Burrow v{}", env!("CARGO_PKG_VERSION"));

    let api_token = resolve_api_token(&args)?;

    let mut builder = Session::builder()
        .forwards(args.forwards.iter().cloned())
        .proxy_ports(args.proxy_ports.clone())
        .control_port(args.control_port)
        .image(args.image.clone())
        .auth_timeout(Duration::from_secs(args.auth_timeout))
        .idle_timeout(Duration::from_secs(args.idle_timeout))
        .retry_budget(args.retry_budget)
        .ready_timeout(Duration::from_secs(args.ready_timeout))
        .connect_timeout(Duration::from_secs(args.connect_timeout))
        .heartbeat_interval(Duration::from_secs(args.heartbeat_interval))
        .api(ControlPlaneConfig {
            endpoint: args.api_url.clone(),
            api_token: Some(api_token),
            project: args.project.clone(),
            ..Default::default()
        });

    builder = if args.tls.plaintext {
        builder.plaintext()
    } else {
        builder.tls(TlsConfig {
            ca_cert_path: args.tls.tls_ca.clone(),
            server_name: args.tls.tls_server_name.clone(),
            skip_verify: args.tls.tls_skip_verify,
        })
    };

    let session = builder.build().context("Invalid tunnel configuration")?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(cancel_on_interrupt(tokio::signal::ctrl_c(), ctrl_c));

    let result = session
        .run_with(shutdown, |session| {
            info!(
                instance = %session.instance_id,
                forwards = session.forwards.len(),
                "Tunnel ready, press Ctrl+C to stop"
            );
        })
        .await;

    if args.observability.metrics {
        match burrow_observability::gather_metrics() {
            Ok(snapshot) => debug!("Metrics snapshot:\n{snapshot}"),
            Err(e) => error!("Failed to gather metrics: {e}"),
        }
    }
    shutdown_tracing();

    result.context("Tunnel session failed")
}
