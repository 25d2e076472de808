//! Prometheus counters for relay and session activity
//!
//! Metrics are registered lazily and only recorded after [`init_metrics`]
//! has been called, so binaries that never expose them pay a single atomic
//! load per event.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static ENABLED: AtomicBool = AtomicBool::new(false);

/// All counters the tunnel records
pub struct TunnelMetrics {
    pub connections_total: IntCounter,
    pub connections_active: IntGauge,
    pub handshakes_total: IntCounterVec,
    pub bytes_total: IntCounterVec,
    pub heartbeats_total: IntCounter,
    pub handshake_seconds: Histogram,
}

static TUNNEL_METRICS: LazyLock<TunnelMetrics> = LazyLock::new(|| {
    let metrics = TunnelMetrics {
        connections_total: IntCounter::new(
            "burrow_relay_connections_total",
            "Local connections accepted by relays",
        )
        .unwrap(),
        connections_active: IntGauge::new(
            "burrow_relay_connections_active",
            "Relay connections currently pumping",
        )
        .unwrap(),
        handshakes_total: IntCounterVec::new(
            Opts::new(
                "burrow_handshakes_total",
                "Admission handshakes by outcome",
            ),
            &["status"],
        )
        .unwrap(),
        bytes_total: IntCounterVec::new(
            Opts::new("burrow_relay_bytes_total", "Bytes relayed by direction"),
            &["direction"],
        )
        .unwrap(),
        heartbeats_total: IntCounter::new(
            "burrow_heartbeats_total",
            "Heartbeats sent on the control connection",
        )
        .unwrap(),
        handshake_seconds: Histogram::with_opts(
            HistogramOpts::new(
                "burrow_handshake_duration_seconds",
                "Dial plus admission handshake latency",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .unwrap(),
    };

    REGISTRY
        .register(Box::new(metrics.connections_total.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(metrics.connections_active.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(metrics.handshakes_total.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(metrics.bytes_total.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(metrics.heartbeats_total.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(metrics.handshake_seconds.clone()))
        .unwrap();

    metrics
});

/// Registers the metrics and turns recording on.
pub fn init_metrics() {
    LazyLock::force(&TUNNEL_METRICS);
    ENABLED.store(true, Ordering::Release);
}

#[inline]
pub fn metrics_enabled() -> bool {
    ENABLED.load(Ordering::Acquire)
}

pub fn tunnel_metrics() -> &'static TunnelMetrics {
    &TUNNEL_METRICS
}

/// Current state in the Prometheus text exposition format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
