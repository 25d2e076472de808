use opentelemetry::trace::TracerProvider as _;
use opentelemetry::global;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::OnceLock;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// How logs and spans leave the process
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub service_name: String,
    /// OTLP/gRPC collector; spans are only exported when set
    pub otlp_endpoint: Option<String>,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            otlp_endpoint: None,
            json: false,
        }
    }
}

static PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

fn env_filter() -> EnvFilter {
    // Relay connections log at debug, RUST_LOG=debug opts in
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn fmt_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    }
}

fn tracer_provider(service_name: &str, endpoint: &str) -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .with_batch_exporter(exporter)
        .build())
}

/// Install the global subscriber: env filter, fmt output and, when an OTLP
/// endpoint is configured, an OpenTelemetry span layer.
pub fn init_tracing(config: TracingConfig) -> anyhow::Result<()> {
    let otel_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            global::set_text_map_propagator(TraceContextPropagator::new());
            let provider = tracer_provider(&config.service_name, endpoint)?;
            let tracer = provider.tracer("burrow");
            let _ = PROVIDER.set(provider.clone());
            global::set_tracer_provider(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    Registry::default()
        .with(env_filter())
        .with(fmt_layer(config.json))
        .with(otel_layer)
        .try_init()?;

    tracing::debug!(
        service = %config.service_name,
        otlp = config.otlp_endpoint.is_some(),
        "Logging initialized"
    );
    Ok(())
}

/// Flush pending spans. A no-op when no exporter was installed.
pub fn shutdown_tracing() {
    if let Some(provider) = PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::error!("Failed to flush spans: {e}");
        }
    }
}
