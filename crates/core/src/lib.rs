//! You.i Engine driver - session control for apps built with You.i Engine
//!
//! A session talks to the engine embedded in the app over a TCP command
//! socket, optionally alongside a native platform driver that handles what
//! the engine cannot (installing apps, key presses, orientation).
//!
//! # Quick Start
//!
//! ```ignore
//! use youi::{Capabilities, SessionController};
//!
//! let caps: Capabilities = serde_json::from_value(serde_json::json!({
//!     "platformName": "noproxy",
//!     "youiEngineAppAddress": "192.168.1.20",
//! }))?;
//!
//! let mut session = SessionController::builder().build();
//! session.create_session(caps).await?;
//! let source = session.execute_command("getPageSource", vec![]).await?;
//! session.delete_session().await?;
//! ```
//!
//! # Routing
//!
//! - `receiveAsyncResponse` is always handled locally
//! - any other command before the socket is connected fails with [`Error::NotReady`]
//! - allow-listed commands go to the proxy when one is running
//! - the rest go through the [`CommandRegistry`], then the [`BaseSession`]

pub mod base;
pub mod commands;
pub mod controller;
pub mod device;
pub mod error;
pub mod proxy;
pub mod settings;
pub mod timeout;
pub mod validate;

pub use base::{BaseSession, DefaultBaseSession};
pub use commands::{CommandHandler, CommandRegistry, LOCATOR_STRATEGIES, RECEIVE_ASYNC_RESPONSE};
pub use controller::{SessionController, SessionControllerBuilder, SessionPhase};
pub use device::{DeviceFactory, PlatformDevice, UnavailableDevices};
pub use error::{Error, Result};
pub use proxy::{AllowList, ProxyDriver, ProxyFactory, ProxyKind, UnavailableProxies};
pub use settings::DeviceSettings;
pub use timeout::NewCommandTimer;
pub use validate::validate_capabilities;
pub use youi_protocol::{Capabilities, Platform};
pub use youi_runtime::{AppResolver, Endpoint, TransportConfig};
