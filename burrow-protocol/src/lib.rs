//! Burrow wire protocol
//!
//! This crate defines the byte-level contracts between the Burrow client and
//! the remote proxy process: the admission handshake, the heartbeat frame and
//! the argument vector the proxy is launched with.

pub mod args;
pub mod codec;
pub mod constants;

pub use args::{ArgsError, ProxyArgs, RouteToken, Transport};
pub use codec::{HandshakeStatus, StatusCodec};
pub use constants::HEARTBEAT_PAYLOAD;
