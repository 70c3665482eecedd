//! Session lifecycle and command routing.
//!
//! ```text
//! Uninitialized ──create_session──▶ Starting ──┬──▶ Proxying   ──delete_session──▶ TornDown
//!                                              └──▶ LocalReady ──delete_session──▶ TornDown
//! ```
//!
//! A failed start always runs [`SessionController::delete_session`] before the
//! error is returned, so no proxy, device or socket outlives it.


use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use youi_protocol::{Capabilities, Platform, RemoteCommand, RemoteReply};
use youi_runtime::{AppResolver, Connector, ConnectionState, Endpoint, SocketTransport, TcpConnector, TransportConfig};

use crate::base::{BaseSession, DefaultBaseSession};
use crate::commands::{CommandRegistry, RECEIVE_ASYNC_RESPONSE};
use crate::device::{DeviceFactory, PlatformDevice, UnavailableDevices};
use crate::error::{Error, Result};
use crate::proxy::{AllowList, ProxyDriver, ProxyFactory, ProxyKind, UnavailableProxies};
use crate::settings::{DISPLAYED_ONLY_FILTER, DeviceSettings, SOURCE_TREE_FILTER, TIME_DILATION};
use crate::timeout::NewCommandTimer;
use crate::validate::validate_capabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
	Uninitialized,
	Starting,
	/// Ready, with a proxy sub-driver taking allow-listed commands.
	Proxying,
	/// Ready, every command handled by the engine or the base session.
	LocalReady,
	TornDown,
}

/// Everything a live session owns.
#[derive(Default)]
struct SessionState {
	ready: bool,
	proxy: Option<Box<dyn ProxyDriver>>,
	device: Option<Box<dyn PlatformDevice>>,
	allow_list: AllowList,
	platform: Option<Platform>,
}

/// Builder for [`SessionController`].
pub struct SessionControllerBuilder {
	base: Box<dyn BaseSession>,
	proxies: Arc<dyn ProxyFactory>,
	devices: Arc<dyn DeviceFactory>,
	resolver: Option<Arc<AppResolver>>,
	transport: TransportConfig,
	connector: Arc<dyn Connector>,
	registry: CommandRegistry,
}

impl Default for SessionControllerBuilder {
	fn default() -> Self {
		Self {
			base: Box::new(DefaultBaseSession::new()),
			proxies: Arc::new(UnavailableProxies),
			devices: Arc::new(UnavailableDevices),
			resolver: None,
			transport: TransportConfig::default(),
			connector: Arc::new(TcpConnector),
			registry: CommandRegistry::with_defaults(),
		}
	}
}

impl SessionControllerBuilder {
	pub fn base(mut self, base: impl BaseSession + 'static) -> Self {
		self.base = Box::new(base);
		self
	}

	pub fn proxies(mut self, proxies: Arc<dyn ProxyFactory>) -> Self {
		self.proxies = proxies;
		self
	}

	pub fn devices(mut self, devices: Arc<dyn DeviceFactory>) -> Self {
		self.devices = devices;
		self
	}

	/// Resolves the `app` capability before validation when set.
	pub fn resolver(mut self, resolver: Arc<AppResolver>) -> Self {
		self.resolver = Some(resolver);
		self
	}

	pub fn transport(mut self, config: TransportConfig) -> Self {
		self.transport = config;
		self
	}

	pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = connector;
		self
	}

	pub fn registry(mut self, registry: CommandRegistry) -> Self {
		self.registry = registry;
		self
	}

	pub fn build(self) -> SessionController {
		SessionController {
			base: self.base,
			proxies: self.proxies,
			devices: self.devices,
			resolver: self.resolver,
			transport_config: self.transport,
			connector: self.connector,
			registry: Arc::new(self.registry),
			transport: None,
			state: SessionState::default(),
			phase: SessionPhase::Uninitialized,
			settings: DeviceSettings::new(),
			timer: NewCommandTimer::default(),
			caps: None,
			async_response: None,
		}
	}
}

/// Drives one engine session.
///
/// Commands take `&mut self`: the socket carries one exchange at a time.
pub struct SessionController {
	base: Box<dyn BaseSession>,
	proxies: Arc<dyn ProxyFactory>,
	devices: Arc<dyn DeviceFactory>,
	resolver: Option<Arc<AppResolver>>,
	transport_config: TransportConfig,
	connector: Arc<dyn Connector>,
	registry: Arc<CommandRegistry>,
	transport: Option<SocketTransport>,
	state: SessionState,
	phase: SessionPhase,
	settings: DeviceSettings,
	timer: NewCommandTimer,
	caps: Option<Capabilities>,
	async_response: Option<Value>,
}

impl Default for SessionController {
	fn default() -> Self {
		Self::builder().build()
	}
}

impl SessionController {
	pub fn builder() -> SessionControllerBuilder {
		SessionControllerBuilder::default()
	}

	pub fn phase(&self) -> SessionPhase {
		self.phase
	}

	pub fn is_ready(&self) -> bool {
		self.state.ready
	}

	pub fn session_id(&self) -> Option<&str> {
		self.base.session_id()
	}

	pub fn platform(&self) -> Option<Platform> {
		self.state.platform
	}

	pub fn has_proxy(&self) -> bool {
		self.state.proxy.is_some()
	}

	pub fn has_device(&self) -> bool {
		self.state.device.is_some()
	}

	pub fn allow_list(&self) -> &AllowList {
		&self.state.allow_list
	}

	pub fn settings(&self) -> &DeviceSettings {
		&self.settings
	}

	/// Capabilities the session was started with, after `app` resolution.
	pub fn capabilities(&self) -> Option<&Capabilities> {
		self.caps.as_ref()
	}

	pub fn connection(&self) -> Option<&ConnectionState> {
		self.transport.as_ref().map(SocketTransport::state)
	}

	/// Last payload delivered through `receiveAsyncResponse`.
	pub fn take_async_response(&mut self) -> Option<Value> {
		self.async_response.take()
	}

	/// Starts a session and returns its id.
	///
	/// On failure the partially started session is deleted before the error
	/// is returned.
	pub async fn create_session(&mut self, caps: Capabilities) -> Result<String> {
		if matches!(
			self.phase,
			SessionPhase::Starting | SessionPhase::Proxying | SessionPhase::LocalReady
		) {
			return Err(Error::SessionAlreadyStarted);
		}
		self.phase = SessionPhase::Starting;

		match self.start_session(caps).await {
			Ok(session_id) => {
				self.phase = if self.state.proxy.is_some() {
					SessionPhase::Proxying
				} else {
					SessionPhase::LocalReady
				};
				self.timer.start();
				info!(session_id = %session_id, phase = ?self.phase, "Session started");
				Ok(session_id)
			}
			Err(e) => {
				error!("Session start failed: {e}");
				if let Err(cleanup) = self.delete_session().await {
					warn!("Cleanup after failed session start also failed: {cleanup}");
				}
				Err(e)
			}
		}
	}

	async fn start_session(&mut self, mut caps: Capabilities) -> Result<String> {
		self.resolve_app(&mut caps).await?;
		self.base.validate_capabilities(&caps)?;
		let platform = validate_capabilities(&caps)?;

		let session_id = self.base.create_session(&caps).await?;
		self.timer = NewCommandTimer::from_capabilities(&caps);
		self.state.platform = Some(platform);
		self.caps = Some(caps.clone());

		match platform {
			Platform::Ios => self.start_proxy(ProxyKind::ios_for(&caps), &caps).await?,
			Platform::Android => self.start_proxy(ProxyKind::Android, &caps).await?,
			Platform::Mac => self.start_proxy(ProxyKind::Mac, &caps).await?,
			Platform::YiMac | Platform::BlueSky | Platform::YiTvOs => self.start_device(platform, &caps).await?,
			Platform::YiPs4 | Platform::NoProxy | Platform::ConnectToApp => {}
		}

		self.connect_socket(&caps).await?;

		if !caps.wants_full_source_tree() {
			debug!("Setting SourceTreeFilter to displayed elements only");
			let mut update = Map::new();
			update.insert(SOURCE_TREE_FILTER.to_string(), Value::from(DISPLAYED_ONLY_FILTER));
			self.update_settings(update).await?;
		}

		Ok(session_id)
	}

	/// Replaces a string `app` with its resolved local path.
	async fn resolve_app(&self, caps: &mut Capabilities) -> Result<()> {
		let Some(resolver) = &self.resolver else {
			return Ok(());
		};
		let Some(extensions) = caps.platform().and_then(|p| p.ok()).and_then(|p| p.app_extensions()) else {
			return Ok(());
		};
		if let Some(app) = &caps.app {
			let resolved = resolver.resolve_value(app, extensions).await?;
			debug!("Resolved app capability to {resolved}");
			caps.app = Some(resolved);
		}
		Ok(())
	}

	async fn start_proxy(&mut self, kind: ProxyKind, caps: &Capabilities) -> Result<()> {
		info!("Starting {kind} proxy driver");
		// Idle timeout is owned by the controller.
		let mut proxy_caps = caps.clone();
		proxy_caps.new_command_timeout = Some(0);

		self.state.allow_list = kind.allow_list();
		let proxy = self.state.proxy.insert(self.proxies.create(kind)?);
		proxy.create_session(&proxy_caps).await
	}

	async fn start_device(&mut self, platform: Platform, caps: &Capabilities) -> Result<()> {
		info!("Starting {platform} device session");
		let device = self.state.device.insert(self.devices.create(platform, caps)?);
		device.start_session(caps).await
	}

	async fn connect_socket(&mut self, caps: &Capabilities) -> Result<()> {
		let endpoint = Endpoint::from_capabilities(caps)
			.ok_or_else(|| Error::MissingRequiredCapability("youiEngineAppAddress".into()))?;
		let mut transport = SocketTransport::new(endpoint)
			.with_config(self.transport_config.clone())
			.with_connector(Arc::clone(&self.connector));

		let connected = transport.connect().await;
		self.state.ready = transport.is_ready();
		self.transport = Some(transport);
		Ok(connected?)
	}

	/// Runs `name` locally or on the proxy.
	pub async fn execute_command(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
		if name == RECEIVE_ASYNC_RESPONSE {
			debug!("Executing YouiEngineDriver response '{name}'");
			return self.run_local(name, args).await;
		}

		if !self.state.ready {
			debug!("Command Error '{name}'");
			return Err(Error::NotReady {
				command: name.to_string(),
			});
		}

		if self.timer.is_expired() {
			let secs = self.timer.timeout().map_or(0, |t| t.as_secs());
			warn!("Shutting down because no new commands arrived within {secs}s");
			if let Err(e) = self.delete_session().await {
				warn!("Deleting the timed out session failed: {e}");
			}
			return Err(Error::NewCommandTimeout(secs));
		}

		self.timer.clear();
		let result = match self.state.proxy.as_mut() {
			Some(proxy) if self.state.allow_list.contains(name) => {
				debug!("Executing proxied WebDriver command '{name}'");
				proxy.execute_command(name, args).await
			}
			_ => {
				debug!("Executing YouiEngine WebDriver command '{name}'");
				self.run_local(name, args).await
			}
		};
		if self.state.ready {
			self.timer.start();
		}
		result
	}

	async fn run_local(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
		let handler = self.registry.get(name);
		match handler {
			Some(handler) => handler(self, args).await,
			None => self.base.execute_command(name, args).await,
		}
	}

	/// Sends one engine action over the socket and unwraps the reply.
	pub async fn remote(&mut self, action: &str, params: Vec<Value>) -> Result<Value> {
		let transport = self.transport.as_mut().ok_or_else(|| Error::NotReady {
			command: action.to_string(),
		})?;
		let line = RemoteCommand::action(action, params).to_line()?;
		let payload = transport.send(&line).await?;
		self.state.ready = transport.is_ready();

		let reply = RemoteReply::from_slice(&payload)?;
		reply.into_result().map_err(|failure| {
			debug!(status = failure.status, "Engine rejected '{action}': {}", failure.message);
			Error::Remote {
				status: failure.status,
				message: failure.message,
			}
		})
	}

	/// Tears down device, proxy, socket and base session, in that order.
	///
	/// Every step runs even when an earlier one fails; the first failure is
	/// returned.
	pub async fn delete_session(&mut self) -> Result<()> {
		debug!("Deleting YouiEngine session");
		let mut first_err = None;

		if let Some(mut device) = self.state.device.take() {
			if let Err(e) = device.end_session().await {
				warn!("Ending the device session failed: {e}");
				first_err.get_or_insert(e);
			}
		}
		if let Some(mut proxy) = self.state.proxy.take() {
			if let Err(e) = proxy.delete_session().await {
				warn!("Deleting the proxy session failed: {e}");
				first_err.get_or_insert(e);
			}
		}
		if let Some(mut transport) = self.transport.take() {
			transport.close().await;
		}
		if let Err(e) = self.base.delete_session().await {
			first_err.get_or_insert(e);
		}

		self.state.ready = false;
		self.state.allow_list = AllowList::empty();
		self.timer.clear();
		self.phase = SessionPhase::TornDown;

		first_err.map_or(Ok(()), Err)
	}

	/// Stores changed settings and applies each to the live session.
	pub async fn update_settings(&mut self, update: Map<String, Value>) -> Result<()> {
		for (key, value) in self.settings.changes(&update) {
			self.on_settings_update(&key, &value).await?;
			self.settings.set(key, value);
		}
		Ok(())
	}

	/// Applies one setting. Unknown names are ignored.
	pub async fn on_settings_update(&mut self, key: &str, value: &Value) -> Result<()> {
		match key {
			TIME_DILATION => self.set_time_dilation(value).await.map(drop),
			SOURCE_TREE_FILTER => self.set_source_tree_filter(value).await.map(drop),
			_ => {
				debug!("Ignoring unknown setting '{key}'");
				Ok(())
			}
		}
	}

	pub async fn set_time_dilation(&mut self, value: &Value) -> Result<Value> {
		if !value.is_number() {
			return Err(Error::InvalidArgument(format!("TimeDilation must be a number, got {value}")));
		}
		self.remote("setTimeDilation", vec![value.clone()]).await
	}

	pub async fn set_source_tree_filter(&mut self, value: &Value) -> Result<Value> {
		if !value.is_string() {
			return Err(Error::InvalidArgument(format!("SourceTreeFilter must be a string, got {value}")));
		}
		self.remote("setSourceTreeFilter", vec![value.clone()]).await
	}

	pub(crate) fn record_async_response(&mut self, response: Value) {
		debug!("Received async response: {response}");
		self.async_response = Some(response);
	}
}
