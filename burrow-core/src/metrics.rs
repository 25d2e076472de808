//! Recording hooks, compiled to no-ops without the `metrics` feature

#[cfg(feature = "metrics")]
use burrow_observability::{metrics_enabled, tunnel_metrics};
use std::time::Duration;

#[inline]
pub(crate) fn connection_opened() {
    #[cfg(feature = "metrics")]
    if metrics_enabled() {
        let metrics = tunnel_metrics();
        metrics.connections_total.inc();
        metrics.connections_active.inc();
    }
}

#[inline]
pub(crate) fn connection_closed(upstream: u64, downstream: u64) {
    #[cfg(feature = "metrics")]
    if metrics_enabled() {
        let metrics = tunnel_metrics();
        metrics.connections_active.dec();
        metrics
            .bytes_total
            .with_label_values(&["upstream"])
            .inc_by(upstream);
        metrics
            .bytes_total
            .with_label_values(&["downstream"])
            .inc_by(downstream);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (upstream, downstream);
}

#[inline]
pub(crate) fn handshake(status: &str, elapsed: Duration) {
    #[cfg(feature = "metrics")]
    if metrics_enabled() {
        let metrics = tunnel_metrics();
        metrics.handshakes_total.with_label_values(&[status]).inc();
        metrics.handshake_seconds.observe(elapsed.as_secs_f64());
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (status, elapsed);
}

#[inline]
pub(crate) fn heartbeat_sent() {
    #[cfg(feature = "metrics")]
    if metrics_enabled() {
        tunnel_metrics().heartbeats_total.inc();
    }
}
