//! Capability rules specific to engine sessions.

use std::path::Path;

use tracing::error;
use youi_protocol::{Capabilities, Platform};

use crate::error::{Error, Result};

/// Checks the engine-specific capabilities and returns the parsed platform.
///
/// Runs after [`BaseSession::validate_capabilities`](crate::BaseSession::validate_capabilities)
/// and before any socket or proxy work.
pub fn validate_capabilities(caps: &Capabilities) -> Result<Platform> {
	if caps.youi_engine_app_address.as_deref().is_none_or(|a| a.trim().is_empty()) {
		return Err(missing("youiEngineAppAddress"));
	}

	let platform = match caps.platform() {
		Some(Ok(platform)) => platform,
		Some(Err(unknown)) => return Err(Error::UnsupportedPlatform(unknown.0)),
		None => return Err(missing("platformName")),
	};

	if platform.attaches_only() {
		return Ok(platform);
	}

	let app = match &caps.app {
		None => return Err(missing("app")),
		Some(serde_json::Value::String(app)) if app.is_empty() => return Err(missing("app")),
		Some(serde_json::Value::String(app)) => app,
		Some(_) => {
			return Err(Error::InvalidCapability {
				name: "app".into(),
				reason: "expected a path or URL string".into(),
			});
		}
	};
	if !Path::new(app).exists() {
		let absolute = std::path::absolute(app).unwrap_or_else(|_| app.into());
		error!("The app could not be found in following location: {}", absolute.display());
		return Err(Error::AppNotFound(absolute));
	}

	let is_android_device = caps
		.device_name
		.as_deref()
		.is_some_and(|name| name.eq_ignore_ascii_case("android"));
	if is_android_device && caps.avd.is_none() {
		return Err(missing("avd"));
	}

	Ok(platform)
}

fn missing(name: &str) -> Error {
	error!("The desired capabilities must include {name}");
	Error::MissingRequiredCapability(name.to_string())
}
