//! Error types for the session controller.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while creating, driving or tearing down a session.
#[derive(Debug, Error)]
pub enum Error {
	/// A command arrived before the socket was connected.
	#[error("Driver is not ready, cannot execute {command}.")]
	NotReady { command: String },

	#[error("The desired capabilities must include {0}")]
	MissingRequiredCapability(String),

	#[error("Invalid capability '{name}': {reason}")]
	InvalidCapability { name: String, reason: String },

	#[error("The app could not be found in following location: {}", .0.display())]
	AppNotFound(PathBuf),

	#[error("Unsupported platformName: {0}")]
	UnsupportedPlatform(String),

	#[error("A session is already running")]
	SessionAlreadyStarted,

	/// Neither the command table nor the base session knows the command.
	#[error("Command '{0}' is not implemented")]
	UnknownCommand(String),

	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The engine answered with a non-zero status.
	#[error("Remote command failed with status {status}: {message}")]
	Remote { status: i64, message: String },

	#[error("Proxy driver error: {0}")]
	Proxy(String),

	#[error("Platform device error: {0}")]
	Device(String),

	/// No command arrived within `newCommandTimeout`; the session was deleted.
	#[error("New command timeout of {0}s expired. The session has been deleted")]
	NewCommandTimeout(u64),

	/// Resolver or transport failure.
	#[error(transparent)]
	Runtime(#[from] youi_runtime::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true when the session is gone and a new one must be created.
	pub fn is_session_lost(&self) -> bool {
		matches!(self, Error::NotReady { .. } | Error::NewCommandTimeout(_))
	}
}
