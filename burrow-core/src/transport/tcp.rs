//! Plain TCP transport

use super::socket_tuning::configure_socket_silent;
use super::BoxedStream;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};

/// Binds a listener on the loopback interface only.
pub async fn bind_loopback(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await
}

pub async fn connect_stream(addr: &str) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    configure_socket_silent(&stream);
    Ok(stream)
}

pub async fn connect(addr: &str) -> io::Result<BoxedStream> {
    Ok(Box::pin(connect_stream(addr).await?))
}
