//! Per-connection relay: dial, admit, pump, close

use super::handshake::authenticate_within;
use super::pump::{pump, PumpEnd};
use crate::auth::AuthToken;
use crate::transport::Dialer;
use burrow_common::error::is_benign_io;
use burrow_common::{Result, TunnelError};
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Level};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// What every connection of one relay shares
#[derive(Debug)]
pub struct ConnectionContext {
    pub dialer: Dialer,
    /// Exposed proxy endpoint, `host:port`
    pub remote_addr: String,
    /// `None` skips the handshake
    pub auth_token: Option<AuthToken>,
    pub handshake_timeout: Duration,
    /// Bound on TCP connect plus TLS handshake
    pub connect_timeout: Duration,
    /// Human-readable destination, for logs
    pub target: String,
}

/// Relays one accepted local connection through a freshly dialed proxy
/// connection.
///
/// Returning drops both sockets. Cancelling `shutdown` expires the
/// connection wherever it is blocked.
pub async fn handle_connection(
    local: TcpStream,
    ctx: Arc<ConnectionContext>,
    shutdown: CancellationToken,
) -> Result<()> {
    let expire = shutdown.child_token();
    let _expire_on_return = expire.clone().drop_guard();

    let mut remote = tokio::select! {
        biased;
        () = expire.cancelled() => return Ok(()),
        dialed = ctx.dialer.connect_within(&ctx.remote_addr, ctx.connect_timeout) => dialed.map_err(|e| {
            TunnelError::Connection(format!("dial {}: {e}", ctx.remote_addr))
        })?,
    };

    let leftover = match &ctx.auth_token {
        Some(token) => tokio::select! {
            biased;
            () = expire.cancelled() => return Ok(()),
            admitted = authenticate_within(&mut remote, token, ctx.handshake_timeout) => admitted?,
        },
        None => BytesMut::new(),
    };

    crate::metrics::connection_opened();
    let (mut local_reader, mut local_writer) = local.into_split();
    let (mut remote_reader, mut remote_writer) = tokio::io::split(remote);

    if !leftover.is_empty() {
        if let Err(e) = local_writer.write_all(&leftover).await {
            crate::metrics::connection_closed(0, 0);
            return Err(e.into());
        }
    }

    let upstream_token = expire.child_token();
    let downstream_token = expire.child_token();
    let (upstream, downstream) = tokio::join!(
        pump(
            &mut local_reader,
            &mut remote_writer,
            upstream_token.clone(),
            downstream_token.clone(),
        ),
        pump(
            &mut remote_reader,
            &mut local_writer,
            downstream_token,
            upstream_token,
        ),
    );
    crate::metrics::connection_closed(upstream.bytes, downstream.bytes);

    log_pump_end("upstream", &ctx.target, &upstream.end);
    log_pump_end("downstream", &ctx.target, &downstream.end);
    debug!(
        target_addr = %ctx.target,
        upstream = upstream.bytes,
        downstream = downstream.bytes,
        "Connection closed"
    );

    // close_notify can stall on a dead peer
    match tokio::time::timeout(CLOSE_GRACE, remote_writer.shutdown()).await {
        Ok(closed) => log_close("remote", &ctx.target, closed),
        Err(_) => debug!(target_addr = %ctx.target, "Remote close timed out"),
    }
    log_close("local", &ctx.target, local_writer.shutdown().await);
    Ok(())
}

/// Level a failed socket close is logged at
fn close_level(err: &std::io::Error) -> Level {
    if is_benign_io(err) {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

fn log_close(side: &str, target: &str, closed: std::io::Result<()>) {
    let Err(e) = closed else { return };
    if close_level(&e) == Level::DEBUG {
        debug!(side, target_addr = %target, error = %e, "Close failed");
    } else {
        warn!(side, target_addr = %target, error = %e, "Close failed");
    }
}

fn log_pump_end(direction: &str, target: &str, end: &PumpEnd) {
    if let PumpEnd::Failed(e) = end {
        if is_benign_io(e) {
            debug!(direction, target_addr = %target, error = %e, "Pump stopped");
        } else {
            error!(direction, target_addr = %target, error = %e, "Pump failed");
        }
    }
}

/// Logs a failed connection at a level matching how actionable it is.
pub fn report_connection_error(target: &str, err: &TunnelError) {
    match err {
        TunnelError::NoCapacity => warn!(target_addr = %target, "{err}"),
        TunnelError::RemoteInternal(_) => error!(target_addr = %target, "{err}"),
        e if e.is_benign() => debug!(target_addr = %target, error = %e, "Connection ended"),
        e => error!(target_addr = %target, error = %e, "Connection failed"),
    }
}
