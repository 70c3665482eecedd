//! Error types for artifact resolution and the command socket.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the resolver and the socket transport.
#[derive(Debug, Error)]
pub enum Error {
	/// Reference is neither an existing local path nor a supported URL.
	#[error("The application at '{0}' does not exist or is not accessible")]
	NotFound(String),

	/// Reference has a URL scheme other than http/https.
	#[error("The protocol '{protocol}' used in '{reference}' is not supported. Only http: and https: protocols are supported")]
	UnsupportedProtocol { protocol: String, reference: String },

	/// Fetching a remote application failed.
	#[error("Problem downloading app from url {url}: {reason}")]
	DownloadFailed { url: String, reason: String },

	/// The archive is not a readable zip file.
	#[error("'{path}' is not a valid zip archive: {reason}")]
	InvalidArchive { path: PathBuf, reason: String },

	/// Extraction succeeded but nothing matched the accepted extensions.
	#[error(
		"App zip unzipped OK, but we could not find {} bundle(s) in '{}'. Make sure your archive contains {} package(s) and nothing else",
		.extensions.join(","), .archive.display(), .extensions.join(",")
	)]
	NoBundleFound { archive: PathBuf, extensions: Vec<String> },

	/// No usable extension was supplied for the app.
	#[error("Cannot resolve '{0}': at least one accepted app extension is required")]
	NoAcceptedExtensions(String),

	/// Resolved path does not carry an accepted extension.
	#[error("New app path '{}' did not have extension(s) '{}'", .path.display(), .extensions.join(","))]
	ExtensionMismatch { path: PathBuf, extensions: Vec<String> },

	/// Every connection attempt to the engine failed.
	#[error("Failed to connect to {endpoint} {attempts} times. Aborting.")]
	ConnectFailed { endpoint: String, attempts: u32 },

	/// Every attempt to exchange a command failed.
	#[error("Socket command '{command}' failed after {attempts} attempt(s)")]
	CommandFailed { command: String, attempts: u32 },

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true for errors produced while resolving an application.
	pub fn is_resolution(&self) -> bool {
		matches!(
			self,
			Error::NotFound(_)
				| Error::UnsupportedProtocol { .. }
				| Error::DownloadFailed { .. }
				| Error::InvalidArchive { .. }
				| Error::NoBundleFound { .. }
				| Error::ExtensionMismatch { .. }
				| Error::NoAcceptedExtensions(_)
		)
	}

	/// Returns true for errors produced by the command socket.
	pub fn is_transport(&self) -> bool {
		matches!(self, Error::ConnectFailed { .. } | Error::CommandFailed { .. })
	}
}
