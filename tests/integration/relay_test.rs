//! Relay integration tests over TLS

use super::{test_cert, tls_dialer};
use burrow_core::{AuthToken, Relay, RelayConfig};
use burrow_tests::{shared_token, start_echo_server, Admission, MockProxy, Role};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "0123456789abcdefghijABCDEFGHIJxy";

async fn start_relay(
    proxy: &MockProxy,
    ca: &std::path::Path,
    token: &str,
    shutdown: &CancellationToken,
) -> SocketAddr {
    let config = RelayConfig::new(0, format!("localhost:{}", proxy.addr.port()))
        .with_auth_token(AuthToken::new(token).unwrap())
        .with_target("nginx:8080")
        .with_handshake_timeout(Duration::from_secs(2));
    let bound = Relay::new(config, tls_dialer(ca)).bind().await.unwrap();
    let local = bound.local_addr();
    tokio::spawn(bound.serve(shutdown.clone()));
    local
}

async fn read_to_end_within(stream: &mut TcpStream, limit: Duration) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(limit, stream.read_to_end(&mut out))
        .await
        .expect("relay should close the local connection")
        .unwrap_or_default();
    out
}

#[tokio::test]
async fn test_admitted_connection_relays_both_ways() {
    let (cert, ca) = test_cert();
    let (backend, _echo) = start_echo_server().await;
    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Data(backend), Admission::Admit).await;
    let shutdown = CancellationToken::new();
    let local = start_relay(&proxy, &ca, TOKEN, &shutdown).await;

    let mut client = TcpStream::connect(local).await.unwrap();
    let payload = vec![0x5Au8; 200 * 1024];
    let (mut reader, mut writer) = client.split();
    let write = async {
        writer.write_all(&payload).await.unwrap();
    };
    let read = async {
        let mut received = vec![0u8; payload.len()];
        reader.read_exact(&mut received).await.unwrap();
        received
    };
    let ((), received) = tokio::join!(write, read);
    assert_eq!(received, payload);
    assert_eq!(proxy.stats.admitted.load(Ordering::SeqCst), 1);

    shutdown.cancel();
}

#[tokio::test]
async fn test_each_connection_dials_and_authenticates() {
    let (cert, ca) = test_cert();
    let (backend, _echo) = start_echo_server().await;
    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Data(backend), Admission::Admit).await;
    let shutdown = CancellationToken::new();
    let local = start_relay(&proxy, &ca, TOKEN, &shutdown).await;

    for i in 0..3u8 {
        let mut client = TcpStream::connect(local).await.unwrap();
        client.write_all(&[i; 16]).await.unwrap();
        let mut echoed = [0u8; 16];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, [i; 16]);
    }
    assert_eq!(proxy.stats.connections.load(Ordering::SeqCst), 3);
    assert_eq!(proxy.stats.admitted.load(Ordering::SeqCst), 3);

    shutdown.cancel();
}

#[tokio::test]
async fn test_rejection_drops_only_that_connection() {
    let (cert, ca) = test_cert();
    let (backend, _echo) = start_echo_server().await;
    let proxy = MockProxy::start(
        &cert,
        shared_token(TOKEN),
        Role::Data(backend),
        Admission::RejectFirst(1),
    )
    .await;
    let shutdown = CancellationToken::new();
    let local = start_relay(&proxy, &ca, TOKEN, &shutdown).await;

    // Both clients are in flight before the proxy answers either one
    let first = TcpStream::connect(local).await.unwrap();
    let second = TcpStream::connect(local).await.unwrap();
    let (first, second) = tokio::join!(echo_once(first, b"first"), echo_once(second, b"second"));

    let echoed: Vec<_> = [first, second].into_iter().flatten().collect();
    assert_eq!(echoed.len(), 1, "exactly one connection should be relayed");
    assert!(echoed[0] == b"first" || echoed[0] == b"second");
    assert_eq!(proxy.stats.connections.load(Ordering::SeqCst), 2);
    assert_eq!(proxy.stats.admitted.load(Ordering::SeqCst), 1);

    shutdown.cancel();
}

/// Sends `payload` and returns it if the relay echoed it back, `None` if the
/// relay closed the connection first.
async fn echo_once(mut client: TcpStream, payload: &[u8]) -> Option<Vec<u8>> {
    let _ = client.write_all(payload).await;
    let mut echoed = vec![0u8; payload.len()];
    match tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut echoed))
        .await
        .expect("relay should answer or close")
    {
        Ok(_) => Some(echoed),
        Err(_) => None,
    }
}

#[tokio::test]
async fn test_internal_error_closes_local_connection() {
    let (cert, ca) = test_cert();
    let (backend, _echo) = start_echo_server().await;
    let proxy = MockProxy::start(
        &cert,
        shared_token(TOKEN),
        Role::Data(backend),
        Admission::InternalError("backend dial failed".into()),
    )
    .await;
    let shutdown = CancellationToken::new();
    let local = start_relay(&proxy, &ca, TOKEN, &shutdown).await;

    let mut client = TcpStream::connect(local).await.unwrap();
    assert!(read_to_end_within(&mut client, Duration::from_secs(5))
        .await
        .is_empty());
    assert_eq!(proxy.stats.admitted.load(Ordering::SeqCst), 0);

    shutdown.cancel();
}

#[tokio::test]
async fn test_wrong_token_is_never_admitted() {
    let (cert, ca) = test_cert();
    let (backend, _echo) = start_echo_server().await;
    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Data(backend), Admission::Admit).await;
    let shutdown = CancellationToken::new();
    let local = start_relay(&proxy, &ca, "ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ", &shutdown).await;

    let mut client = TcpStream::connect(local).await.unwrap();
    assert!(read_to_end_within(&mut client, Duration::from_secs(5))
        .await
        .is_empty());
    assert_eq!(proxy.stats.bad_tokens.load(Ordering::SeqCst), 1);

    shutdown.cancel();
}

#[tokio::test]
async fn test_backend_close_unblocks_local_side() {
    let (cert, ca) = test_cert();

    // Says goodbye and hangs up without reading anything.
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = backend.accept().await {
            let _ = socket.write_all(b"bye").await;
        }
    });

    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Data(backend_addr), Admission::Admit).await;
    let shutdown = CancellationToken::new();
    let local = start_relay(&proxy, &ca, TOKEN, &shutdown).await;

    // The client never closes its write side, so only sibling
    // cancellation can end the upstream pump.
    let mut client = TcpStream::connect(local).await.unwrap();
    let received = read_to_end_within(&mut client, Duration::from_secs(5)).await;
    assert_eq!(received, b"bye");

    shutdown.cancel();
}

#[tokio::test]
async fn test_shutdown_closes_listener() {
    let (cert, ca) = test_cert();
    let (backend, _echo) = start_echo_server().await;
    let proxy = MockProxy::start(&cert, shared_token(TOKEN), Role::Data(backend), Admission::Admit).await;
    let shutdown = CancellationToken::new();

    let config = RelayConfig::new(0, format!("localhost:{}", proxy.addr.port()))
        .with_auth_token(AuthToken::new(TOKEN).unwrap());
    let bound = Relay::new(config, tls_dialer(&ca)).bind().await.unwrap();
    let local = bound.local_addr();
    let serving = tokio::spawn(bound.serve(shutdown.clone()));

    let mut open = TcpStream::connect(local).await.unwrap();
    open.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    open.read_exact(&mut echoed).await.unwrap();

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // In-flight connections are expired too.
    assert!(read_to_end_within(&mut open, Duration::from_secs(5))
        .await
        .is_empty());
    assert!(TcpStream::connect(local).await.is_err());
}
