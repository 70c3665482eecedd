//! Command table consulted by [`SessionController::execute_command`].
//!
//! Maps a WebDriver command name to an async handler. The table is built once
//! with [`CommandRegistry::with_defaults`]; names it does not contain fall
//! through to the base session.

mod element;
mod engine;

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::controller::SessionController;
use crate::error::{Error, Result};

/// Reserved command delivering the result of an asynchronous script.
pub const RECEIVE_ASYNC_RESPONSE: &str = "receiveAsyncResponse";

/// Locator strategies the engine understands.
pub const LOCATOR_STRATEGIES: &[&str] = &["id", "name", "class name", "accessibility id"];

pub type CommandFuture<'a> = BoxFuture<'a, Result<Value>>;

/// Handler for one command name.
pub type CommandHandler = for<'a> fn(&'a mut SessionController, Vec<Value>) -> CommandFuture<'a>;

#[derive(Clone, Default)]
pub struct CommandRegistry {
	handlers: HashMap<&'static str, CommandHandler>,
}

impl std::fmt::Debug for CommandRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut names = self.names();
		names.sort_unstable();
		f.debug_struct("CommandRegistry").field("commands", &names).finish()
	}
}

impl CommandRegistry {
	/// An empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// The engine command table.
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();
		registry
			.register("getPageSource", engine::get_page_source)
			.register("getScreenshot", engine::get_screenshot)
			.register("getWindowSize", engine::get_window_size)
			.register("setTimeDilation", engine::set_time_dilation)
			.register("setSourceTreeFilter", engine::set_source_tree_filter)
			.register("updateSettings", engine::update_settings)
			.register("getSettings", engine::get_settings)
			.register(RECEIVE_ASYNC_RESPONSE, engine::receive_async_response)
			.register("findElement", element::find_element)
			.register("findElements", element::find_elements)
			.register("findElementFromElement", element::find_element_from_element)
			.register("findElementsFromElement", element::find_elements_from_element)
			.register("click", element::click)
			.register("getText", element::get_text)
			.register("setValue", element::set_value)
			.register("clear", element::clear)
			.register("getAttribute", element::get_attribute)
			.register("elementDisplayed", element::element_displayed);
		registry
	}

	/// Adds or replaces the handler for `name`.
	pub fn register(&mut self, name: &'static str, handler: CommandHandler) -> &mut Self {
		self.handlers.insert(name, handler);
		self
	}

	pub fn get(&self, name: &str) -> Option<CommandHandler> {
		self.handlers.get(name).copied()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.handlers.contains_key(name)
	}

	pub fn names(&self) -> Vec<&'static str> {
		self.handlers.keys().copied().collect()
	}
}

/// Rejects strategies outside [`LOCATOR_STRATEGIES`].
pub fn validate_locator_strategy(strategy: &str) -> Result<()> {
	if LOCATOR_STRATEGIES.contains(&strategy) {
		return Ok(());
	}
	Err(Error::InvalidArgument(format!(
		"Locator strategy '{strategy}' is not supported. Valid strategies are: {}",
		LOCATOR_STRATEGIES.join(", ")
	)))
}

/// Positional string argument `index` of `command`.
fn string_arg(args: &[Value], index: usize, command: &str) -> Result<String> {
	match args.get(index) {
		Some(Value::String(s)) => Ok(s.clone()),
		Some(other) => Err(Error::InvalidArgument(format!(
			"{command}: argument {index} must be a string, got {other}"
		))),
		None => Err(Error::InvalidArgument(format!("{command}: missing argument {index}"))),
	}
}
