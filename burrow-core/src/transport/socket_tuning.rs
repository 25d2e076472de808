//! Socket options for long-lived relay connections
//!
//! - `TCP_NODELAY`: interactive protocols (SSH, database wire protocols) stall
//!   behind Nagle's algorithm
//! - TCP keepalive: NAT gateways between the client and the proxy drop idle
//!   flows well before the proxy's idle timeout

use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

const KEEPALIVE_TIME: Duration = Duration::from_secs(45);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub fn configure_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;

    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_TIME)
        .with_interval(KEEPALIVE_INTERVAL);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

pub fn configure_socket_silent(stream: &TcpStream) {
    if let Err(e) = configure_socket(stream) {
        tracing::debug!("Failed to tune socket: {}", e);
    }
}
