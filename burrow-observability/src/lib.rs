//! Logging, span export and Prometheus counters for Burrow

pub mod metrics;
pub mod tracing;

pub use metrics::{
    gather_metrics, init_metrics, metrics_enabled, tunnel_metrics, TunnelMetrics, REGISTRY,
};
pub use tracing::{init_tracing, shutdown_tracing, TracingConfig};

/// What the binary asked for on the command line
#[derive(Debug, Clone, Default)]
pub struct ObservabilityOptions {
    /// Export spans to `OTEL_EXPORTER_OTLP_ENDPOINT`
    pub otlp: bool,
    /// Record relay counters
    pub metrics: bool,
    pub json: bool,
}

/// One-call setup for binaries.
///
/// Falls back to plain stderr logging if the exporter cannot be built, so a
/// broken collector never stops the tunnel from starting.
pub fn init_observability(service_name: &str, options: &ObservabilityOptions) {
    if options.metrics {
        init_metrics();
    }

    let config = TracingConfig {
        service_name: service_name.to_string(),
        otlp_endpoint: options
            .otlp
            .then(|| std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok())
            .flatten(),
        json: options.json,
    };
    if let Err(e) = init_tracing(config) {
        init_minimal_logging();
        ::tracing::warn!("Span export disabled: {e}");
    }
}

/// Plain stderr logging, `RUST_LOG` aware. Ignored if a subscriber exists.
pub fn init_minimal_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
