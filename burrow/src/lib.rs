//! # Burrow
//!
//! Forward local TCP ports to services on a private network, through an
//! ephemeral TLS proxy instance launched for the duration of a session.
//!
//! ## Overview
//!
//! A [`Session`] resolves the requested targets, provisions a proxy
//! instance through the control-plane API, keeps it alive over a heartbeat
//! connection and listens on `127.0.0.1` for each forward. Every local
//! connection is relayed over its own TLS connection, admitted by a
//! per-session token. When the session ends the listeners close and the
//! instance is deleted.
//!
//! ## Architecture
//!
//! - [`burrow-common`] - Errors, configuration and defaults
//! - [`burrow-protocol`] - Handshake codec and proxy argument encoding
//! - [`burrow-core`] - Relays, provisioning and the control-plane client
//!
//! ## Re-exports
//!
//! This crate re-exports the most commonly used items from the subcrates
//! for convenience.

pub mod config;
pub mod session;

// Re-export subcrates
pub use burrow_common as common;
pub use burrow_core as tunnel;
pub use burrow_protocol as protocol;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::{Result, TunnelError};
    pub use crate::config::{ForwardInfo, SessionConfig, SessionInfo};
    pub use crate::tunnel::ForwardSpec;
    pub use crate::session::{Session, SessionBuilder};
}

// Convenience re-exports at crate root
pub use common::{Result, TunnelError};
pub use config::{ForwardInfo, SessionConfig, SessionInfo};
pub use session::{Session, SessionBuilder};
