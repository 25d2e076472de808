//! Heartbeat connection to the proxy's control port

use super::handshake::authenticate_within;
use crate::auth::AuthToken;
use crate::transport::Dialer;
use burrow_common::constants::DEFAULT_CONNECT_TIMEOUT_SECS;
use burrow_common::{HeartbeatConfig, Result, TunnelError};
use burrow_protocol::HEARTBEAT_PAYLOAD;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Keeps the proxy instance from idling out.
///
/// The proxy terminates itself once heartbeats stop for its idle timeout,
/// so the session must treat a failed control relay as fatal.
pub struct ControlRelay {
    remote_addr: String,
    auth_token: AuthToken,
    dialer: Dialer,
    heartbeat: HeartbeatConfig,
    handshake_timeout: Duration,
    connect_timeout: Duration,
}

impl ControlRelay {
    pub fn new(
        remote_addr: impl Into<String>,
        auth_token: AuthToken,
        dialer: Dialer,
        heartbeat: HeartbeatConfig,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            auth_token,
            dialer,
            heartbeat,
            handshake_timeout,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Bound on TCP connect plus TLS handshake. Default: 10 seconds
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connects, authenticates, signals `ready`, then heartbeats until
    /// `shutdown` fires.
    ///
    /// `ready` is dropped unsent when setup fails or `shutdown` fires first.
    pub async fn run(self, ready: oneshot::Sender<()>, shutdown: CancellationToken) -> Result<()> {
        let setup = async {
            let mut stream = self
                .dialer
                .connect_within(&self.remote_addr, self.connect_timeout)
                .await
                .map_err(|e| {
                    TunnelError::Connection(format!("control dial {}: {e}", self.remote_addr))
                })?;
            authenticate_within(&mut stream, &self.auth_token, self.handshake_timeout).await?;
            Ok::<_, TunnelError>(stream)
        };
        let stream = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                debug!("Control relay cancelled before it was ready");
                return Ok(());
            }
            stream = setup => stream?,
        };

        info!(remote = %self.remote_addr, "Control connection established");
        let _ = ready.send(());

        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut ticker = interval(self.heartbeat.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let mut scratch = [0u8; 64];
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!("Control relay stopping");
                    let _ = writer.shutdown().await;
                    return Ok(());
                }
                read = reader.read(&mut scratch) => match read {
                    Ok(0) => {
                        return Err(TunnelError::Heartbeat(
                            "proxy closed the control connection".into(),
                        ))
                    }
                    // The proxy never speaks here, drain whatever it sends
                    Ok(_) => {}
                    Err(e) => return Err(TunnelError::Heartbeat(e.to_string())),
                },
                _ = ticker.tick() => {
                    let sent = async {
                        writer.write_all(HEARTBEAT_PAYLOAD).await?;
                        writer.flush().await
                    }
                    .await;
                    sent.map_err(|e| TunnelError::Heartbeat(e.to_string()))?;
                    crate::metrics::heartbeat_sent();
                    debug!("Heartbeat sent");
                }
            }
        }
    }
}
