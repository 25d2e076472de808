//! End-to-end session tests

use super::{test_cert, tls_config};
use burrow::{Session, SessionInfo, TunnelError};
use burrow_tests::{
    get_free_port, init_test_logging, shared_token, start_echo_server, start_stalled_listener,
    wait_for_server, Admission, MockControlPlane, MockProxy, Role,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Harness {
    control_plane: Arc<MockControlPlane>,
    data: MockProxy,
    control: MockProxy,
    ca: PathBuf,
    _echo: JoinHandle<()>,
}

async fn harness(
    control_admission: Admission,
    configure: impl FnOnce(MockControlPlane) -> MockControlPlane,
) -> Harness {
    harness_with(Role::Control, control_admission, configure).await
}

async fn harness_with(
    control_role: Role,
    control_admission: Admission,
    configure: impl FnOnce(MockControlPlane) -> MockControlPlane,
) -> Harness {
    init_test_logging();
    let (cert, ca) = test_cert();
    let token = shared_token("");
    let (backend, echo) = start_echo_server().await;
    let data = MockProxy::start(&cert, token.clone(), Role::Data(backend), Admission::Admit).await;
    let control = MockProxy::start(&cert, token.clone(), control_role, control_admission).await;
    let control_plane = Arc::new(configure(MockControlPlane::new("localhost", token)));

    Harness {
        control_plane,
        data,
        control,
        ca,
        _echo: echo,
    }
}

fn session(h: &Harness, forwards: Vec<String>) -> Session {
    Session::builder()
        .forwards(forwards)
        .proxy_ports(vec![h.data.addr.port()])
        .control_port(h.control.addr.port())
        .ready_timeout(Duration::from_secs(2))
        .tls(tls_config(&h.ca))
        .control_plane(h.control_plane.clone())
        .build()
        .unwrap()
}

fn spawn_session(
    session: Session,
    shutdown: &CancellationToken,
) -> (
    JoinHandle<burrow::Result<()>>,
    oneshot::Receiver<SessionInfo>,
) {
    let (info_tx, info_rx) = oneshot::channel();
    let shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        session
            .run_with(shutdown, move |info| {
                let _ = info_tx.send(info.clone());
            })
            .await
    });
    (handle, info_rx)
}

#[tokio::test]
async fn test_session_end_to_end() {
    let h = harness(Admission::Admit, |cp| cp.with_instance("nginx", "10.0.0.7")).await;
    let local_port = get_free_port();
    let shutdown = CancellationToken::new();
    let (running, info_rx) =
        spawn_session(session(&h, vec![format!("{local_port}:nginx:8080")]), &shutdown);

    let info = tokio::time::timeout(Duration::from_secs(10), info_rx)
        .await
        .expect("session should become ready")
        .unwrap();
    assert_eq!(info.forwards.len(), 1);
    assert_eq!(info.forwards[0].local_addr.port(), local_port);
    assert_eq!(info.forwards[0].address, "10.0.0.7");
    assert_eq!(
        info.forwards[0].to_string(),
        format!(
            "127.0.0.1:{local_port} -> nginx:8080 via localhost:{}",
            h.data.addr.port()
        )
    );

    {
        let created = h.control_plane.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        let args = &created[0].args;
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], format!("{}:10", h.control.addr.port()));
        assert_eq!(args[2], "600");
        assert_eq!(
            args[3],
            format!("[TCP2TCP:nginx:8080:{}:27]", h.data.addr.port())
        );
        let ports: Vec<u16> = created[0].services.iter().map(|s| s.port).collect();
        assert!(ports.contains(&h.data.addr.port()));
        assert!(ports.contains(&h.control.addr.port()));
        assert!(created[0].services.iter().all(|s| s.tls));
    }
    assert_eq!(h.control.stats.admitted.load(Ordering::SeqCst), 1);
    assert!(wait_for_server(info.forwards[0].local_addr, Duration::from_secs(2)).await);

    let mut client = TcpStream::connect(("127.0.0.1", local_port)).await.unwrap();
    client.write_all(b"hello through the burrow").await.unwrap();
    let mut echoed = [0u8; 24];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"hello through the burrow");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(h.control_plane.deleted_count(), 1);
    assert!(TcpStream::connect(("127.0.0.1", local_port)).await.is_err());
}

#[tokio::test]
async fn test_private_address_skips_lookup() {
    let h = harness(Admission::Admit, |cp| cp).await;
    let local_port = get_free_port();
    let shutdown = CancellationToken::new();
    let (running, info_rx) = spawn_session(
        session(&h, vec![format!("{local_port}:db.internal:5432")]),
        &shutdown,
    );

    let info = tokio::time::timeout(Duration::from_secs(10), info_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.forwards[0].address, "db.internal");
    assert_eq!(h.control_plane.resolve_calls.load(Ordering::SeqCst), 0);

    shutdown.cancel();
    running.await.unwrap().unwrap();
    assert_eq!(h.control_plane.deleted_count(), 1);
}

#[tokio::test]
async fn test_unknown_target_provisions_nothing() {
    let h = harness(Admission::Admit, |cp| cp.with_instance("nginx", "10.0.0.7")).await;
    let session = session(&h, vec!["nginx:80".into(), "ghost:80".into()]);

    let err = session.run(CancellationToken::new()).await.unwrap_err();
    match err {
        TunnelError::NotFound(missing) => assert_eq!(missing, vec!["ghost"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.control_plane.created_count(), 0);
}

#[tokio::test]
async fn test_malformed_forward_provisions_nothing() {
    let h = harness(Admission::Admit, |cp| cp).await;
    let session = session(&h, vec!["8080:80".into()]);

    let err = session.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TunnelError::Parse { .. }));
    assert_eq!(h.control_plane.created_count(), 0);
    assert_eq!(h.control_plane.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_control_failure_tears_down_instance() {
    let h = harness(Admission::Reject, |cp| cp.with_instance("nginx", "10.0.0.7")).await;
    let local_port = get_free_port();
    let session = session(&h, vec![format!("{local_port}:nginx:8080")]);

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        session.run(CancellationToken::new()),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, TunnelError::NoCapacity));
    assert_eq!(h.control_plane.created_count(), 1);
    assert_eq!(h.control_plane.deleted_count(), 1);
    // Relays never started
    assert!(TcpStream::connect(("127.0.0.1", local_port)).await.is_err());
}

#[tokio::test]
async fn test_failed_instance_is_deleted() {
    let h = harness(Admission::Admit, |cp| cp.with_instance("nginx", "10.0.0.7").failing()).await;
    let session = session(&h, vec!["nginx:8080".into()]);

    let err = session.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TunnelError::InvalidState(_)));
    assert_eq!(h.control_plane.deleted_count(), 1);
}

#[tokio::test]
async fn test_busy_local_port_tears_down_instance() {
    let h = harness(Admission::Admit, |cp| cp.with_instance("nginx", "10.0.0.7")).await;
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let local_port = taken.local_addr().unwrap().port();
    let session = session(&h, vec![format!("{local_port}:nginx:8080")]);

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        session.run(CancellationToken::new()),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, TunnelError::Config(_)));
    assert_eq!(h.control_plane.deleted_count(), 1);
}

#[tokio::test]
async fn test_control_loss_ends_session() {
    let h = harness_with(
        Role::ControlHangUpAfter(Duration::from_millis(500)),
        Admission::Admit,
        |cp| cp.with_instance("nginx", "10.0.0.7"),
    )
    .await;
    let local_port = get_free_port();
    let (running, info_rx) = spawn_session(
        session(&h, vec![format!("{local_port}:nginx:8080")]),
        &CancellationToken::new(),
    );

    tokio::time::timeout(Duration::from_secs(10), info_rx)
        .await
        .expect("session should become ready")
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("losing the control connection should end the session")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, TunnelError::Heartbeat(_)), "unexpected error: {err}");
    assert!(TcpStream::connect(("127.0.0.1", local_port)).await.is_err());
    assert_eq!(h.control_plane.deleted_count(), 1);
}

struct StalledControl {
    control_plane: Arc<MockControlPlane>,
    session: Session,
    _stalled: JoinHandle<()>,
}

/// A session whose control endpoint accepts TCP but never completes TLS.
async fn stalled_control(connect_timeout: Duration) -> StalledControl {
    init_test_logging();
    let (_cert, ca) = test_cert();
    let (stalled, handle) = start_stalled_listener().await;
    let control_plane = Arc::new(
        MockControlPlane::new("localhost", shared_token("")).with_instance("nginx", "10.0.0.7"),
    );
    let session = Session::builder()
        .forward("nginx:8080")
        .proxy_ports(vec![get_free_port()])
        .control_port(stalled.port())
        .connect_timeout(connect_timeout)
        .tls(tls_config(&ca))
        .control_plane(control_plane.clone())
        .build()
        .unwrap();

    StalledControl {
        control_plane,
        session,
        _stalled: handle,
    }
}

#[tokio::test]
async fn test_shutdown_during_stalled_control_handshake_tears_down() {
    let stalled = stalled_control(Duration::from_secs(60)).await;
    let shutdown = CancellationToken::new();
    let (running, info_rx) = spawn_session(stalled.session, &shutdown);

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("shutdown should interrupt the control handshake")
        .unwrap()
        .unwrap();
    assert!(info_rx.await.is_err());
    assert_eq!(stalled.control_plane.created_count(), 1);
    assert_eq!(stalled.control_plane.deleted_count(), 1);
}

#[tokio::test]
async fn test_stalled_control_handshake_times_out() {
    let stalled = stalled_control(Duration::from_millis(300)).await;

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        stalled.session.run(CancellationToken::new()),
    )
    .await
    .expect("connect timeout should bound the control dial")
    .unwrap_err();
    assert!(matches!(err, TunnelError::Connection(_)), "unexpected error: {err}");
    assert_eq!(stalled.control_plane.deleted_count(), 1);
}
