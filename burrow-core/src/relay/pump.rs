//! One-directional byte pumps
//!
//! A relayed connection runs two pumps, one per direction. Whichever pump
//! stops first cancels its sibling's token, which interrupts a read or
//! write the sibling is blocked in. Neither pump closes a socket.

use burrow_common::constants::COPY_BUFFER_SIZE;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Why a pump stopped
#[derive(Debug)]
pub enum PumpEnd {
    /// The reader hit end of stream
    Eof,
    /// The sibling pump or the session asked this pump to stop
    Cancelled,
    /// Reading or writing failed
    Failed(io::Error),
}

#[derive(Debug)]
pub struct PumpOutcome {
    pub bytes: u64,
    pub end: PumpEnd,
}

/// Copies `reader` into `writer` until EOF, error or cancellation of `own`,
/// then cancels `sibling`.
pub async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    own: CancellationToken,
    sibling: CancellationToken,
) -> PumpOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut bytes = 0u64;

    let end = loop {
        let n = tokio::select! {
            biased;
            () = own.cancelled() => break PumpEnd::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break PumpEnd::Eof,
                Ok(n) => n,
                Err(e) => break PumpEnd::Failed(e),
            },
        };

        let written = tokio::select! {
            biased;
            () = own.cancelled() => break PumpEnd::Cancelled,
            written = async {
                writer.write_all(&buf[..n]).await?;
                writer.flush().await
            } => written,
        };
        if let Err(e) = written {
            break PumpEnd::Failed(e);
        }
        bytes += n as u64;
    };

    sibling.cancel();
    PumpOutcome { bytes, end }
}
