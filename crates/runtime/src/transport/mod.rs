//! Command socket to the You.i Engine app.
//!
//! One [`SocketTransport`] owns one connection. Commands are written as a
//! single line and the reply is read until a chunk ends with the `youiend`
//! marker (see [`youi_protocol::ResponseFrame`]).
//!
//! # Retries
//!
//! - `connect` makes up to `max_attempts` tries, each bounded by the idle
//!   timeout. A refused connection waits `refused_backoff` before the next try.
//! - `send` reconnects first when the stream is gone, then makes up to
//!   `max_attempts` write/read exchanges before failing with
//!   [`Error::CommandFailed`].
//!
//! Exchanges are strictly one at a time; the transport takes `&mut self` so
//! callers serialize by construction.

mod connector;

#[cfg(test)]
mod tests;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use youi_protocol::{Capabilities, DEFAULT_APP_PORT, ResponseFrame, encode_command};

pub use connector::{Connector, SocketStream, TcpConnector};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REFUSED_BACKOFF: Duration = Duration::from_secs(2);

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Retry and timeout settings for the command socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
	pub max_attempts: u32,
	/// Bounds each connect attempt and each read or write while exchanging.
	pub idle_timeout: Duration,
	/// Pause after a refused connection before trying again.
	pub refused_backoff: Duration,
	pub keepalive: bool,
}

impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			idle_timeout: DEFAULT_IDLE_TIMEOUT,
			refused_backoff: DEFAULT_REFUSED_BACKOFF,
			keepalive: true,
		}
	}
}

impl TransportConfig {
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);
		self
	}

	pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
		self.idle_timeout = idle_timeout;
		self
	}

	pub fn with_refused_backoff(mut self, refused_backoff: Duration) -> Self {
		self.refused_backoff = refused_backoff;
		self
	}

	pub fn with_keepalive(mut self, keepalive: bool) -> Self {
		self.keepalive = keepalive;
		self
	}
}

/// Host and port of the engine's command socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
	pub host: String,
	pub port: u16,
}

impl Endpoint {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self { host: host.into(), port }
	}

	/// Reads `youiEngineAppAddress` and `youiEngineAppPort`.
	///
	/// Without a port override the platform default applies. Returns `None`
	/// when no address is given.
	pub fn from_capabilities(caps: &Capabilities) -> Option<Self> {
		let host = caps.youi_engine_app_address.clone()?;
		let port = caps.youi_engine_app_port.unwrap_or_else(|| {
			caps.platform()
				.and_then(|p| p.ok())
				.map(|p| p.default_port())
				.unwrap_or(DEFAULT_APP_PORT)
		});
		Some(Self { host, port })
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.host, self.port)
	}
}

/// Observable state of the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
	pub ready: bool,
	/// Attempts made by the most recent connect loop.
	pub retry_count: u32,
	pub last_error: Option<io::ErrorKind>,
}

/// Framed command channel to one engine instance.
pub struct SocketTransport {
	endpoint: Endpoint,
	config: TransportConfig,
	connector: Arc<dyn Connector>,
	stream: Option<Box<dyn SocketStream>>,
	state: ConnectionState,
}

impl fmt::Debug for SocketTransport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SocketTransport")
			.field("endpoint", &self.endpoint)
			.field("config", &self.config)
			.field("state", &self.state)
			.field("writable", &self.stream.is_some())
			.finish()
	}
}

impl SocketTransport {
	pub fn new(endpoint: Endpoint) -> Self {
		Self {
			endpoint,
			config: TransportConfig::default(),
			connector: Arc::new(TcpConnector),
			stream: None,
			state: ConnectionState::default(),
		}
	}

	pub fn with_config(mut self, config: TransportConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = connector;
		self
	}

	pub fn endpoint(&self) -> &Endpoint {
		&self.endpoint
	}

	pub fn config(&self) -> &TransportConfig {
		&self.config
	}

	pub fn state(&self) -> &ConnectionState {
		&self.state
	}

	pub fn is_ready(&self) -> bool {
		self.state.ready
	}

	/// Whether a live stream is available for the next exchange.
	pub fn is_writable(&self) -> bool {
		self.stream.is_some()
	}

	/// Connects, replacing any previous stream.
	///
	/// Fails with [`Error::ConnectFailed`] once every attempt has failed.
	pub async fn connect(&mut self) -> Result<()> {
		self.stream = None;
		self.state = ConnectionState::default();

		loop {
			self.state.retry_count += 1;
			let attempt = self.state.retry_count;
			debug!(attempt, endpoint = %self.endpoint, "Connecting to the app");

			let kind = match timeout(self.config.idle_timeout, self.connector.connect(&self.endpoint, &self.config)).await
			{
				Ok(Ok(stream)) => {
					self.stream = Some(stream);
					self.state.ready = true;
					self.state.last_error = None;
					info!("Connected to {} after {attempt} attempt(s)", self.endpoint);
					return Ok(());
				}
				Ok(Err(e)) => {
					warn!(attempt, "Unable to connect to {}: {e}", self.endpoint);
					e.kind()
				}
				Err(_) => {
					warn!(attempt, "Connection to {} timed out", self.endpoint);
					io::ErrorKind::TimedOut
				}
			};
			self.state.last_error = Some(kind);

			if attempt >= self.config.max_attempts {
				error!("Failed to connect {attempt} times. Aborting.");
				return Err(Error::ConnectFailed {
					endpoint: self.endpoint.to_string(),
					attempts: attempt,
				});
			}

			if kind == io::ErrorKind::ConnectionRefused {
				debug!("Connection refused, retrying in {:?}", self.config.refused_backoff);
				sleep(self.config.refused_backoff).await;
			}
		}
	}

	/// Writes `command` and returns the reply with the end marker stripped.
	pub async fn send(&mut self, command: &str) -> Result<Vec<u8>> {
		let line = encode_command(command);

		for attempt in 1..=self.config.max_attempts {
			if !self.is_writable() {
				info!("Socket is not writable. Trying to reconnect");
				self.connect().await?;
			}

			debug!(attempt, "Sending socket command: {command}");
			match self.exchange(&line).await {
				Ok(payload) => {
					debug!(attempt, bytes = payload.len(), "Received socket response");
					return Ok(payload);
				}
				Err(e) if e.kind() == io::ErrorKind::TimedOut => {
					warn!(attempt, "Socket command timed out");
				}
				Err(e) => {
					warn!(attempt, "Socket error while sending command: {e}");
					self.stream = None;
				}
			}
		}

		Err(Error::CommandFailed {
			command: command.to_string(),
			attempts: self.config.max_attempts,
		})
	}

	/// One write followed by reads until a chunk ends with the marker.
	async fn exchange(&mut self, line: &[u8]) -> io::Result<Vec<u8>> {
		let idle = self.config.idle_timeout;
		let stream = self
			.stream
			.as_mut()
			.ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

		bounded(idle, stream.write_all(line)).await?;
		bounded(idle, stream.flush()).await?;

		let mut frame = ResponseFrame::new();
		let mut buf = vec![0u8; READ_BUFFER_SIZE];
		loop {
			let n = bounded(idle, stream.read(&mut buf)).await?;
			if n == 0 {
				return Err(io::Error::new(
					io::ErrorKind::UnexpectedEof,
					format!("connection closed with {} byte(s) buffered", frame.buffered_len()),
				));
			}
			if let Some(payload) = frame.push(&buf[..n]) {
				return Ok(payload);
			}
		}
	}

	/// Drops the stream. The transport can be connected again afterwards.
	pub async fn close(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			if let Err(e) = stream.shutdown().await {
				debug!("Ignoring socket shutdown error: {e}");
			}
		}
		self.state.ready = false;
	}
}

async fn bounded<T>(idle: Duration, fut: impl Future<Output = io::Result<T>>) -> io::Result<T> {
	timeout(idle, fut)
		.await
		.unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "socket idle timeout")))
}
