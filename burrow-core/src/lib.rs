pub mod auth;
pub mod control_plane;
pub mod forward;
mod metrics;
pub mod provision;
pub mod relay;
pub mod resolve;
pub mod transport;

// Re-export specific items for convenience
pub use auth::AuthToken;
pub use control_plane::{ControlPlane, HttpControlPlane};
pub use forward::ForwardSpec;
pub use provision::{ProxyInstance, ProxyProvisioner};
pub use relay::{ControlRelay, Relay, RelayConfig};
pub use resolve::AddressResolver;
pub use transport::{Dialer, TransportConfig};
