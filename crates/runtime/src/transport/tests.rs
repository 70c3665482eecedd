use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::*;

enum Attempt {
	Refuse,
	Fail(io::ErrorKind),
	Hang,
	Accept(DuplexStream),
}

/// Plays back a fixed sequence of connection outcomes.
struct ScriptedConnector {
	script: Mutex<VecDeque<Attempt>>,
	calls: AtomicU32,
}

impl ScriptedConnector {
	fn new(script: impl IntoIterator<Item = Attempt>) -> Arc<Self> {
		Arc::new(Self {
			script: Mutex::new(script.into_iter().collect()),
			calls: AtomicU32::new(0),
		})
	}

	fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Connector for ScriptedConnector {
	async fn connect(&self, _endpoint: &Endpoint, _config: &TransportConfig) -> io::Result<Box<dyn SocketStream>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let next = self.script.lock().pop_front();
		match next {
			Some(Attempt::Accept(stream)) => Ok(Box::new(stream)),
			Some(Attempt::Fail(kind)) => Err(io::Error::from(kind)),
			Some(Attempt::Hang) => std::future::pending().await,
			Some(Attempt::Refuse) | None => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
		}
	}
}

fn transport(connector: Arc<ScriptedConnector>, config: TransportConfig) -> SocketTransport {
	SocketTransport::new(Endpoint::new("127.0.0.1", DEFAULT_APP_PORT))
		.with_config(config)
		.with_connector(connector)
}

async fn read_line(stream: &mut DuplexStream) -> String {
	let mut line = Vec::new();
	let mut byte = [0u8; 1];
	loop {
		stream.read_exact(&mut byte).await.unwrap();
		if byte[0] == b'\n' {
			break;
		}
		line.push(byte[0]);
	}
	String::from_utf8(line).unwrap()
}

/// Reads one command, then answers with `chunks`, pausing between writes so
/// each chunk arrives as a separate read. The stream stays open.
fn spawn_engine(mut engine: DuplexStream, chunks: Vec<&'static str>) -> JoinHandle<(String, DuplexStream)> {
	tokio::spawn(async move {
		let line = read_line(&mut engine).await;
		for chunk in chunks {
			engine.write_all(chunk.as_bytes()).await.unwrap();
			tokio::time::sleep(Duration::from_millis(50)).await;
		}
		(line, engine)
	})
}

#[tokio::test(start_paused = true)]
async fn connect_retries_refused_until_third_attempt() {
	let (client, _engine) = tokio::io::duplex(1024);
	let connector = ScriptedConnector::new([Attempt::Refuse, Attempt::Refuse, Attempt::Accept(client)]);
	let mut transport = transport(connector.clone(), TransportConfig::default());

	let started = Instant::now();
	transport.connect().await.unwrap();

	assert!(transport.is_ready());
	assert!(transport.is_writable());
	assert_eq!(transport.state().retry_count, 3);
	assert_eq!(transport.state().last_error, None);
	assert_eq!(connector.calls(), 3);
	assert!(started.elapsed() >= DEFAULT_REFUSED_BACKOFF * 2);
}

#[tokio::test(start_paused = true)]
async fn connect_gives_up_after_max_attempts() {
	let connector = ScriptedConnector::new([Attempt::Refuse, Attempt::Refuse, Attempt::Refuse]);
	let mut transport = transport(connector.clone(), TransportConfig::default());

	let started = Instant::now();
	let err = transport.connect().await.unwrap_err();

	match err {
		Error::ConnectFailed { endpoint, attempts } => {
			assert_eq!(endpoint, "127.0.0.1:12345");
			assert_eq!(attempts, 3);
		}
		other => panic!("unexpected error: {other}"),
	}
	assert!(!transport.is_ready());
	assert_eq!(transport.state().last_error, Some(io::ErrorKind::ConnectionRefused));
	// No pause after the final failure.
	let elapsed = started.elapsed();
	assert!(elapsed >= DEFAULT_REFUSED_BACKOFF * 2 && elapsed < DEFAULT_REFUSED_BACKOFF * 3);
}

#[tokio::test(start_paused = true)]
async fn other_connect_errors_retry_without_backoff() {
	let (client, _engine) = tokio::io::duplex(1024);
	let connector = ScriptedConnector::new([Attempt::Fail(io::ErrorKind::ConnectionReset), Attempt::Accept(client)]);
	let mut transport = transport(connector, TransportConfig::default());

	let started = Instant::now();
	transport.connect().await.unwrap();

	assert_eq!(transport.state().retry_count, 2);
	assert!(started.elapsed() < DEFAULT_REFUSED_BACKOFF);
}

#[tokio::test(start_paused = true)]
async fn hanging_connect_is_bounded_by_idle_timeout() {
	let (client, _engine) = tokio::io::duplex(1024);
	let connector = ScriptedConnector::new([Attempt::Hang, Attempt::Accept(client)]);
	let config = TransportConfig::default().with_idle_timeout(Duration::from_secs(3));
	let mut transport = transport(connector, config);

	let started = Instant::now();
	transport.connect().await.unwrap();

	assert_eq!(transport.state().retry_count, 2);
	assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn send_returns_single_chunk_payload() {
	let (client, engine) = tokio::io::duplex(1024);
	let engine = spawn_engine(engine, vec![r#"{"status":0,"value":"ok"}youiend"#]);
	let mut transport = transport(ScriptedConnector::new([Attempt::Accept(client)]), TransportConfig::default());
	transport.connect().await.unwrap();

	let payload = transport.send(r#"{"cmd":"action","action":"getSource"}"#).await.unwrap();

	assert_eq!(payload, br#"{"status":0,"value":"ok"}"#);
	let (line, _engine) = engine.await.unwrap();
	assert_eq!(line, r#"{"cmd":"action","action":"getSource"}"#);
}

#[tokio::test(start_paused = true)]
async fn send_accumulates_chunks_until_marker() {
	let (client, engine) = tokio::io::duplex(1024);
	let _engine = spawn_engine(engine, vec!["<Root>", "<Child/>", "</Root>youiend"]);
	let mut transport = transport(ScriptedConnector::new([Attempt::Accept(client)]), TransportConfig::default());
	transport.connect().await.unwrap();

	let payload = transport.send("source").await.unwrap();

	assert_eq!(payload, b"<Root><Child/></Root>");
}

#[tokio::test(start_paused = true)]
async fn marker_split_across_chunks_is_not_detected() {
	let (client, engine) = tokio::io::duplex(1024);
	let _engine = spawn_engine(engine, vec!["payloadyou", "iend"]);
	let config = TransportConfig::default()
		.with_max_attempts(1)
		.with_idle_timeout(Duration::from_secs(1));
	let mut transport = transport(ScriptedConnector::new([Attempt::Accept(client)]), config);
	transport.connect().await.unwrap();

	let started = Instant::now();
	let err = transport.send("source").await.unwrap_err();

	match err {
		Error::CommandFailed { command, attempts } => {
			assert_eq!(command, "source");
			assert_eq!(attempts, 1);
		}
		other => panic!("unexpected error: {other}"),
	}
	assert!(started.elapsed() >= Duration::from_secs(1));
	// A timeout leaves the stream in place for the next command.
	assert!(transport.is_writable());
}

#[tokio::test(start_paused = true)]
async fn closed_stream_is_replaced_on_next_attempt() {
	let (first, mut first_engine) = tokio::io::duplex(1024);
	let (second, second_engine) = tokio::io::duplex(1024);
	let connector = ScriptedConnector::new([Attempt::Accept(first), Attempt::Accept(second)]);
	let mut transport = transport(connector.clone(), TransportConfig::default());
	transport.connect().await.unwrap();

	let dropper = tokio::spawn(async move {
		read_line(&mut first_engine).await;
	});
	let _engine = spawn_engine(second_engine, vec!["pongyouiend"]);

	let payload = transport.send("ping").await.unwrap();
	dropper.await.unwrap();

	assert_eq!(payload, b"pong");
	assert_eq!(connector.calls(), 2);
	assert!(transport.is_ready());
}

#[tokio::test(start_paused = true)]
async fn send_connects_when_never_connected() {
	let (client, engine) = tokio::io::duplex(1024);
	let _engine = spawn_engine(engine, vec!["youiend"]);
	let connector = ScriptedConnector::new([Attempt::Accept(client)]);
	let mut transport = transport(connector.clone(), TransportConfig::default());

	let payload = transport.send("noop").await.unwrap();

	assert!(payload.is_empty());
	assert_eq!(connector.calls(), 1);
}

#[tokio::test]
async fn close_drops_stream_and_readiness() {
	let (client, _engine) = tokio::io::duplex(64);
	let mut transport = transport(ScriptedConnector::new([Attempt::Accept(client)]), TransportConfig::default());
	transport.connect().await.unwrap();

	transport.close().await;

	assert!(!transport.is_ready());
	assert!(!transport.is_writable());
}

#[tokio::test]
async fn tcp_connector_round_trip() {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	tokio::spawn(async move {
		let (mut socket, _) = listener.accept().await.unwrap();
		let mut buf = vec![0u8; 256];
		let n = socket.read(&mut buf).await.unwrap();
		assert_eq!(&buf[..n], b"hello\n");
		socket.write_all(b"worldyouiend").await.unwrap();
	});

	let mut transport = SocketTransport::new(Endpoint::new("127.0.0.1", port));
	let payload = transport.send("hello").await.unwrap();

	assert_eq!(payload, b"world");
}

#[tokio::test]
async fn tcp_connector_reports_refused() {
	let port = {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		listener.local_addr().unwrap().port()
	};
	let config = TransportConfig::default().with_max_attempts(1);
	let mut transport = SocketTransport::new(Endpoint::new("127.0.0.1", port)).with_config(config);

	let err = transport.connect().await.unwrap_err();

	assert!(matches!(err, Error::ConnectFailed { attempts: 1, .. }), "unexpected error: {err}");
	assert_eq!(transport.state().last_error, Some(io::ErrorKind::ConnectionRefused));
}

#[test]
fn endpoint_from_capabilities_uses_platform_default_port() {
	let caps: Capabilities = serde_json::from_value(serde_json::json!({
		"platformName": "yiPS4",
		"youiEngineAppAddress": "10.0.0.7"
	}))
	.unwrap();
	assert_eq!(Endpoint::from_capabilities(&caps), Some(Endpoint::new("10.0.0.7", 40123)));

	let caps: Capabilities = serde_json::from_value(serde_json::json!({
		"platformName": "Android",
		"youiEngineAppAddress": "localhost",
		"youiEngineAppPort": 9000
	}))
	.unwrap();
	assert_eq!(Endpoint::from_capabilities(&caps).unwrap().to_string(), "localhost:9000");

	let caps: Capabilities = serde_json::from_value(serde_json::json!({"platformName": "iOS"})).unwrap();
	assert_eq!(Endpoint::from_capabilities(&caps), None);
}

#[test]
fn config_setters_clamp_attempts() {
	let config = TransportConfig::default().with_max_attempts(0).with_keepalive(false);
	assert_eq!(config.max_attempts, 1);
	assert!(!config.keepalive);
	assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
}
