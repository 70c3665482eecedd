//! Idle timer between commands.
//!
//! The deadline is checked when the next command arrives rather than by a
//! background task, so an expired session is torn down on first use.

use std::time::Duration;

use tokio::time::Instant;
use youi_protocol::Capabilities;

pub const DEFAULT_NEW_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct NewCommandTimer {
	timeout: Option<Duration>,
	deadline: Option<Instant>,
}

impl Default for NewCommandTimer {
	fn default() -> Self {
		Self::new(DEFAULT_NEW_COMMAND_TIMEOUT)
	}
}

impl NewCommandTimer {
	/// A zero `timeout` disables the timer.
	pub fn new(timeout: Duration) -> Self {
		Self {
			timeout: (!timeout.is_zero()).then_some(timeout),
			deadline: None,
		}
	}

	/// Reads `newCommandTimeout` (seconds), falling back to the default.
	pub fn from_capabilities(caps: &Capabilities) -> Self {
		caps.new_command_timeout
			.map(|secs| Self::new(Duration::from_secs(secs)))
			.unwrap_or_default()
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	/// Arms the timer from now.
	pub fn start(&mut self) {
		self.deadline = self.timeout.map(|timeout| Instant::now() + timeout);
	}

	pub fn clear(&mut self) {
		self.deadline = None;
	}

	pub fn is_expired(&self) -> bool {
		self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
	}
}
