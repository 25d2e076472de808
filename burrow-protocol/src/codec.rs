//! Codec for the admission handshake status
//!
//! After the client writes its raw auth token, the proxy answers with a
//! little-endian status code. Negative codes carry a length-prefixed message.
//!
//! Frame format:
//! ```text
//! ┌──────────────┬──────────────────┬──────────────┐
//! │ Status (i16) │ Length (u32)     │ Message      │
//! │ 2 bytes LE   │ 4 bytes LE       │ N bytes UTF-8│
//! │              │ only if status<0 │              │
//! └──────────────┴──────────────────┴──────────────┘
//! ```

use crate::constants::{
    MAX_MESSAGE_SIZE, MESSAGE_LEN_PREFIX, STATUS_ADMITTED, STATUS_INTERNAL_ERROR, STATUS_LEN,
    STATUS_REJECTED,
};
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Outcome of the admission handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Connection admitted, payload follows
    Admitted,
    /// The proxy has no spare backend connection
    Rejected,
    /// The proxy failed internally
    InternalError(String),
}

impl HandshakeStatus {
    /// Metric/log label for this status.
    pub fn label(&self) -> &'static str {
        match self {
            HandshakeStatus::Admitted => "admitted",
            HandshakeStatus::Rejected => "rejected",
            HandshakeStatus::InternalError(_) => "internal_error",
        }
    }
}

/// Handshake status codec
#[derive(Debug, Clone, Copy)]
pub struct StatusCodec {
    max_message_size: usize,
}

impl Default for StatusCodec {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl StatusCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Decoder for StatusCodec {
    type Item = HandshakeStatus;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < STATUS_LEN {
            return Ok(None);
        }

        let status = i16::from_le_bytes([src[0], src[1]]);

        match status {
            STATUS_ADMITTED => {
                src.advance(STATUS_LEN);
                Ok(Some(HandshakeStatus::Admitted))
            }
            STATUS_REJECTED => {
                src.advance(STATUS_LEN);
                Ok(Some(HandshakeStatus::Rejected))
            }
            s if s < 0 => {
                let header = STATUS_LEN + MESSAGE_LEN_PREFIX;
                if src.len() < header {
                    return Ok(None);
                }

                let mut len_bytes = [0u8; 4];
                len_bytes.copy_from_slice(&src[STATUS_LEN..header]);
                let message_len = u32::from_le_bytes(len_bytes) as usize;

                if message_len > self.max_message_size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Status message too large: {message_len} bytes (max: {})",
                            self.max_message_size
                        ),
                    ));
                }

                if src.len() < header + message_len {
                    src.reserve(header + message_len - src.len());
                    return Ok(None);
                }

                src.advance(header);
                let message = src.split_to(message_len);
                Ok(Some(HandshakeStatus::InternalError(
                    String::from_utf8_lossy(&message).into_owned(),
                )))
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown handshake status: {other}"),
            )),
        }
    }
}

impl Encoder<HandshakeStatus> for StatusCodec {
    type Error = io::Error;

    fn encode(&mut self, status: HandshakeStatus, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match status {
            HandshakeStatus::Admitted => {
                dst.reserve(STATUS_LEN);
                dst.put_i16_le(STATUS_ADMITTED);
            }
            HandshakeStatus::Rejected => {
                dst.reserve(STATUS_LEN);
                dst.put_i16_le(STATUS_REJECTED);
            }
            HandshakeStatus::InternalError(message) => {
                if message.len() > self.max_message_size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Status message too large: {} bytes (max: {})",
                            message.len(),
                            self.max_message_size
                        ),
                    ));
                }
                let len = u32::try_from(message.len())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                dst.reserve(STATUS_LEN + MESSAGE_LEN_PREFIX + message.len());
                dst.put_i16_le(STATUS_INTERNAL_ERROR);
                dst.put_u32_le(len);
                dst.put_slice(message.as_bytes());
            }
        }
        Ok(())
    }
}
