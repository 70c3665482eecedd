//! Device handles owned by a session.
//!
//! Desktop and set-top platforms (`yimac`, `bluesky`, `yitvos`) have no proxy
//! driver. Instead the session launches the app on a device handle and shuts
//! it down again on teardown.

use async_trait::async_trait;
use youi_protocol::{Capabilities, Platform};

use crate::error::{Error, Result};

#[async_trait]
pub trait PlatformDevice: Send + Sync {
	async fn start_session(&mut self, caps: &Capabilities) -> Result<()>;

	async fn end_session(&mut self) -> Result<()>;
}

/// Picks the device implementation for a platform.
///
/// Receives the capabilities so it can choose between, for example, a tvOS
/// simulator and hardware by `udid`.
pub trait DeviceFactory: Send + Sync {
	fn create(&self, platform: Platform, caps: &Capabilities) -> Result<Box<dyn PlatformDevice>>;
}

/// [`DeviceFactory`] for hosts without device support. Every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDevices;

impl DeviceFactory for UnavailableDevices {
	fn create(&self, platform: Platform, _caps: &Capabilities) -> Result<Box<dyn PlatformDevice>> {
		Err(Error::Device(format!("no device support for platform '{platform}'")))
	}
}
