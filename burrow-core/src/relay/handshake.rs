//! Admission handshake with the proxy
//!
//! The client writes the raw session token, then the proxy answers with a
//! status (see [`StatusCodec`]). Only an admitted connection may carry
//! payload; anything the proxy sent after the status is handed back so it
//! can be forwarded before pumping starts.

use crate::auth::AuthToken;
use burrow_common::{Result, TunnelError};
use burrow_protocol::{HandshakeStatus, StatusCodec};
use bytes::BytesMut;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tracing::debug;

/// Presents `token` and waits for the proxy's verdict.
///
/// Returns the bytes read past the status frame. A rejection maps to
/// [`TunnelError::NoCapacity`], an internal failure to
/// [`TunnelError::RemoteInternal`].
pub async fn authenticate<S>(stream: &mut S, token: &AuthToken) -> Result<BytesMut>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    stream.write_all(token.as_bytes()).await?;
    stream.flush().await?;

    let (status, leftover) = {
        let mut framed = FramedRead::new(&mut *stream, StatusCodec::new());
        let status = match framed.next().await {
            Some(status) => status?,
            None => {
                return Err(TunnelError::Connection(
                    "proxy closed the connection during the handshake".into(),
                ))
            }
        };
        (status, std::mem::take(framed.read_buffer_mut()))
    };

    crate::metrics::handshake(status.label(), started.elapsed());
    debug!(status = status.label(), leftover = leftover.len(), "Handshake complete");

    match status {
        HandshakeStatus::Admitted => Ok(leftover),
        HandshakeStatus::Rejected => Err(TunnelError::NoCapacity),
        HandshakeStatus::InternalError(message) => Err(TunnelError::RemoteInternal(message)),
    }
}

/// [`authenticate`] bounded by `limit`.
pub async fn authenticate_within<S>(
    stream: &mut S,
    token: &AuthToken,
    limit: Duration,
) -> Result<BytesMut>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(limit, authenticate(stream, token))
        .await
        .map_err(|_| TunnelError::Timeout(format!("no handshake status after {limit:?}")))?
}
