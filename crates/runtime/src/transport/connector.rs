//! Socket establishment.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, lookup_host};
use tracing::debug;

use super::{Endpoint, TransportConfig};

/// Byte stream the transport reads responses from and writes commands to.
pub trait SocketStream: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

impl<T> SocketStream for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

/// Opens one connection attempt to the engine.
///
/// The transport owns retries and timeouts; implementations make a single try
/// and report the raw I/O failure so `ConnectionRefused` can be told apart.
#[async_trait]
pub trait Connector: Send + Sync {
	async fn connect(&self, endpoint: &Endpoint, config: &TransportConfig) -> io::Result<Box<dyn SocketStream>>;
}

/// TCP [`Connector`] with keep-alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
	async fn connect(&self, endpoint: &Endpoint, config: &TransportConfig) -> io::Result<Box<dyn SocketStream>> {
		let mut last_err = None;
		for addr in lookup_host((endpoint.host.as_str(), endpoint.port)).await? {
			let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
			socket.set_keepalive(config.keepalive)?;
			match socket.connect(addr).await {
				Ok(stream) => {
					stream.set_nodelay(true)?;
					debug!(%addr, "TCP connection established");
					return Ok(Box::new(stream));
				}
				Err(e) => last_err = Some(e),
			}
		}
		Err(last_err.unwrap_or_else(|| {
			io::Error::new(io::ErrorKind::NotFound, format!("no address found for {endpoint}"))
		}))
	}
}
