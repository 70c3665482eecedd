//! Desired capabilities and the platform discriminator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Port the engine listens on when no override is given.
pub const DEFAULT_APP_PORT: u16 = 12345;

/// Port used by PlayStation 4 builds of the engine.
pub const PS4_APP_PORT: u16 = 40123;

/// Desired capabilities for a session.
///
/// Only the fields the driver core reads are typed; everything else is kept
/// in `extra` so that proxies receive the document unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub platform_name: Option<String>,
	/// Either a string (`"9.3"`) or a bare number (`12`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub platform_version: Option<Value>,
	/// Application reference: local path, URL or bundle id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub device_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub udid: Option<String>,
	/// Android emulator image.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub avd: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub youi_engine_app_address: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub youi_engine_app_port: Option<u16>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub full_source_tree: Option<bool>,
	/// Idle timeout in seconds. `0` disables it.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub new_command_timeout: Option<u64>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Capabilities {
	/// Parses `platformName`, if present.
	pub fn platform(&self) -> Option<Result<Platform, UnknownPlatform>> {
		self.platform_name.as_deref().map(str::parse)
	}

	/// Application reference as a string, when it is one.
	pub fn app_str(&self) -> Option<&str> {
		self.app.as_ref().and_then(Value::as_str)
	}

	/// Major component of `platformVersion`.
	pub fn platform_major_version(&self) -> Option<u32> {
		match self.platform_version.as_ref()? {
			Value::Number(n) => n.as_f64().map(|v| v.trunc() as u32),
			Value::String(s) => s.split('.').next()?.trim().parse().ok(),
			_ => None,
		}
	}

	/// Whether the caller asked for the unfiltered source tree.
	pub fn wants_full_source_tree(&self) -> bool {
		self.full_source_tree == Some(true)
	}
}

/// Platform the application runs on.
///
/// Determines whether a proxy sub-driver or an owned device handle is started,
/// and which default port the engine listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
	Ios,
	Android,
	Mac,
	YiMac,
	BlueSky,
	YiTvOs,
	YiPs4,
	NoProxy,
	ConnectToApp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
	type Err = UnknownPlatform;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"ios" => Ok(Self::Ios),
			"android" => Ok(Self::Android),
			"mac" => Ok(Self::Mac),
			"yimac" => Ok(Self::YiMac),
			"bluesky" => Ok(Self::BlueSky),
			"yitvos" => Ok(Self::YiTvOs),
			"yips4" => Ok(Self::YiPs4),
			"noproxy" => Ok(Self::NoProxy),
			"connecttoapp" => Ok(Self::ConnectToApp),
			_ => Err(UnknownPlatform(s.to_string())),
		}
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Platform {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Ios => "ios",
			Self::Android => "android",
			Self::Mac => "mac",
			Self::YiMac => "yimac",
			Self::BlueSky => "bluesky",
			Self::YiTvOs => "yitvos",
			Self::YiPs4 => "yips4",
			Self::NoProxy => "noproxy",
			Self::ConnectToApp => "connecttoapp",
		}
	}

	/// Engine port used when `youiEngineAppPort` is absent.
	pub fn default_port(&self) -> u16 {
		match self {
			Self::YiPs4 => PS4_APP_PORT,
			_ => DEFAULT_APP_PORT,
		}
	}

	/// Platforms that attach to an already running app and need no `app` capability.
	pub fn attaches_only(&self) -> bool {
		matches!(self, Self::NoProxy | Self::ConnectToApp)
	}

	/// Platforms whose session owns a device handle.
	pub fn owns_device(&self) -> bool {
		matches!(self, Self::YiMac | Self::BlueSky | Self::YiTvOs)
	}

	/// Application extensions accepted when resolving `app` for this platform.
	pub fn app_extensions(&self) -> Option<&'static [&'static str]> {
		match self {
			Self::Ios | Self::YiTvOs => Some(&[".app", ".ipa"]),
			Self::Android => Some(&[".apk"]),
			Self::Mac | Self::YiMac => Some(&[".app"]),
			_ => None,
		}
	}
}
