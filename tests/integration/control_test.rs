//! Control relay integration tests over TLS

use super::{test_cert, tls_dialer};
use burrow_common::{HeartbeatConfig, TunnelError};
use burrow_core::{AuthToken, ControlRelay};
use burrow_tests::{shared_token, Admission, MockProxy, Role};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "control-token-0123456789abcdefgh";

fn control_relay(proxy: &MockProxy, ca: &std::path::Path, interval: Duration) -> ControlRelay {
    ControlRelay::new(
        format!("localhost:{}", proxy.addr.port()),
        AuthToken::new(TOKEN).unwrap(),
        tls_dialer(ca),
        HeartbeatConfig { interval },
        Duration::from_secs(2),
    )
}

#[tokio::test]
async fn test_heartbeats_reach_the_proxy() {
    let (cert, ca) = test_cert();
    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Control, Admission::Admit).await;

    let (ready_tx, ready_rx) = oneshot::channel();
    let shutdown = CancellationToken::new();
    let relay = control_relay(&proxy, &ca, Duration::from_millis(25));
    let running = tokio::spawn(relay.run(ready_tx, shutdown.clone()));

    tokio::time::timeout(Duration::from_secs(5), ready_rx)
        .await
        .expect("control relay should become ready")
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while proxy.stats.heartbeat_bytes.load(Ordering::SeqCst) < 27 {
        assert!(std::time::Instant::now() < deadline, "too few heartbeats");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rejected_control_connection_fails() {
    let (cert, ca) = test_cert();
    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Control, Admission::Reject).await;

    let (ready_tx, ready_rx) = oneshot::channel();
    let relay = control_relay(&proxy, &ca, Duration::from_secs(60));
    let result = relay.run(ready_tx, CancellationToken::new()).await;

    assert!(matches!(result, Err(TunnelError::NoCapacity)));
    assert!(ready_rx.await.is_err());
}

#[tokio::test]
async fn test_untrusted_certificate_fails() {
    let (cert, _ca) = test_cert();
    let (_other, other_ca) = test_cert();
    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Control, Admission::Admit).await;

    let (ready_tx, _ready_rx) = oneshot::channel();
    let relay = control_relay(&proxy, &other_ca, Duration::from_secs(60));
    let result = relay.run(ready_tx, CancellationToken::new()).await;

    assert!(matches!(result, Err(TunnelError::Connection(_))));
    assert_eq!(proxy.stats.admitted.load(Ordering::SeqCst), 0);
}
