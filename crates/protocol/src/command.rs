//! JSON envelopes exchanged with the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command sent to the engine as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
	pub cmd: String,
	pub action: String,
	#[serde(default)]
	pub params: Vec<Value>,
}

impl RemoteCommand {
	pub fn action(action: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			cmd: "action".to_string(),
			action: action.into(),
			params,
		}
	}

	pub fn to_line(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}

/// Reply payload found between the request and the `youiend` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteReply {
	pub status: i64,
	#[serde(default)]
	pub value: Value,
}

/// Non-zero status reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFailure {
	pub status: i64,
	pub message: String,
}

impl RemoteReply {
	pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
		serde_json::from_slice(bytes)
	}

	pub fn into_result(self) -> Result<Value, RemoteFailure> {
		if self.status == 0 {
			return Ok(self.value);
		}

		let message = match &self.value {
			Value::String(s) => s.clone(),
			Value::Object(map) => map
				.get("message")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| self.value.to_string()),
			Value::Null => format!("engine returned status {}", self.status),
			other => other.to_string(),
		};

		Err(RemoteFailure {
			status: self.status,
			message,
		})
	}
}
