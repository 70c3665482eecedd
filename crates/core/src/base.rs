//! Base session handling the controller delegates to.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use youi_protocol::Capabilities;

use crate::error::{Error, Result};

/// Generic session bookkeeping shared by every platform.
///
/// The controller calls into this for capability checks that are not engine
/// specific, for the session id, and for commands its own table does not know.
#[async_trait]
pub trait BaseSession: Send + Sync {
	fn validate_capabilities(&self, caps: &Capabilities) -> Result<()>;

	/// Starts the session and returns its id.
	async fn create_session(&mut self, caps: &Capabilities) -> Result<String>;

	async fn execute_command(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;

	async fn delete_session(&mut self) -> Result<()>;

	fn session_id(&self) -> Option<&str>;
}

/// [`BaseSession`] with random session ids and a `getSession` command.
#[derive(Debug, Default)]
pub struct DefaultBaseSession {
	session_id: Option<String>,
	caps: Option<Capabilities>,
}

impl DefaultBaseSession {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl BaseSession for DefaultBaseSession {
	fn validate_capabilities(&self, caps: &Capabilities) -> Result<()> {
		match caps.platform_name.as_deref() {
			Some(name) if !name.trim().is_empty() => Ok(()),
			_ => Err(Error::MissingRequiredCapability("platformName".into())),
		}
	}

	async fn create_session(&mut self, caps: &Capabilities) -> Result<String> {
		if self.session_id.is_some() {
			return Err(Error::SessionAlreadyStarted);
		}
		let id = uuid::Uuid::new_v4().to_string();
		debug!(session_id = %id, "Created base session");
		self.session_id = Some(id.clone());
		self.caps = Some(caps.clone());
		Ok(id)
	}

	async fn execute_command(&mut self, name: &str, _args: Vec<Value>) -> Result<Value> {
		match name {
			"getSession" => Ok(serde_json::to_value(&self.caps)?),
			_ => Err(Error::UnknownCommand(name.to_string())),
		}
	}

	async fn delete_session(&mut self) -> Result<()> {
		if let Some(id) = self.session_id.take() {
			debug!(session_id = %id, "Deleted base session");
		}
		self.caps = None;
		Ok(())
	}

	fn session_id(&self) -> Option<&str> {
		self.session_id.as_deref()
	}
}
