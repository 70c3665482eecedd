//! Platform sub-drivers that selected commands are forwarded to.
//!
//! On iOS, Android and Mac the controller starts a native automation driver
//! next to the engine socket. Commands that only the native driver can do
//! (installing apps, orientation, key presses) are listed in that platform's
//! [`AllowList`] and delegated; everything else stays with the engine.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use youi_protocol::Capabilities;

use crate::error::{Error, Result};

/// Contract every proxied sub-driver satisfies.
#[async_trait]
pub trait ProxyDriver: Send + Sync {
	async fn create_session(&mut self, caps: &Capabilities) -> Result<()>;

	async fn execute_command(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;

	async fn delete_session(&mut self) -> Result<()>;
}

/// Which native driver a platform needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
	/// `legacy` selects the pre-XCUITest driver for iOS versions below 10.
	Ios { legacy: bool },
	Android,
	Mac,
}

impl ProxyKind {
	/// Platform versions below this use the legacy iOS driver.
	pub const IOS_LEGACY_BELOW: u32 = 10;

	pub fn ios_for(caps: &Capabilities) -> Self {
		let legacy = caps
			.platform_major_version()
			.is_some_and(|major| major < Self::IOS_LEGACY_BELOW);
		ProxyKind::Ios { legacy }
	}

	pub fn allow_list(&self) -> AllowList {
		match self {
			ProxyKind::Ios { .. } => AllowList::ios(),
			ProxyKind::Android => AllowList::android(),
			ProxyKind::Mac => AllowList::mac(),
		}
	}
}

impl fmt::Display for ProxyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProxyKind::Ios { legacy: true } => f.write_str("iOS (legacy)"),
			ProxyKind::Ios { legacy: false } => f.write_str("iOS (XCUITest)"),
			ProxyKind::Android => f.write_str("Android"),
			ProxyKind::Mac => f.write_str("Mac"),
		}
	}
}

/// Builds sub-drivers on demand.
pub trait ProxyFactory: Send + Sync {
	fn create(&self, kind: ProxyKind) -> Result<Box<dyn ProxyDriver>>;
}

/// [`ProxyFactory`] for hosts without native drivers. Every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProxies;

impl ProxyFactory for UnavailableProxies {
	fn create(&self, kind: ProxyKind) -> Result<Box<dyn ProxyDriver>> {
		Err(Error::Proxy(format!("no {kind} driver is available on this host")))
	}
}

pub const TO_PROXY_COMMON: &[&str] = &[
	"background",
	"closeApp",
	"getLog",
	"getLogTypes",
	"getOrientation",
	"getStrings",
	"installApp",
	"launchApp",
	"lock",
	"removeApp",
	"setOrientation",
];

pub const TO_PROXY_IOS_ONLY: &[&str] = &["mobileShake"];

pub const TO_PROXY_ANDROID_ONLY: &[&str] = &[
	"getNetworkConnection",
	"isAppInstalled",
	"isLocked",
	"longPressKeyCode",
	"pressKeyCode",
	"setNetworkConnection",
	"toggleLocationServices",
	"unlock",
];

/// Ordered, immutable set of command names delegated to the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(Vec<&'static str>);

impl AllowList {
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn ios() -> Self {
		Self::from_parts(&[TO_PROXY_COMMON, TO_PROXY_IOS_ONLY])
	}

	pub fn android() -> Self {
		Self::from_parts(&[TO_PROXY_COMMON, TO_PROXY_ANDROID_ONLY])
	}

	pub fn mac() -> Self {
		Self::from_parts(&[TO_PROXY_COMMON])
	}

	fn from_parts(parts: &[&[&'static str]]) -> Self {
		Self(parts.iter().flat_map(|part| part.iter().copied()).collect())
	}

	pub fn contains(&self, command: &str) -> bool {
		self.0.iter().any(|allowed| *allowed == command)
	}

	pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.0.iter().copied()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
