//! Element lookup and interaction.

use serde_json::{Value, json};

use super::{CommandFuture, string_arg, validate_locator_strategy};
use crate::controller::SessionController;
use crate::error::{Error, Result};

async fn find(
	c: &mut SessionController,
	args: &[Value],
	command: &str,
	from_element: bool,
	multiple: bool,
) -> Result<Value> {
	let strategy = string_arg(args, 0, command)?;
	let selector = string_arg(args, 1, command)?;
	let context = if from_element { Value::String(string_arg(args, 2, command)?) } else { Value::Null };
	validate_locator_strategy(&strategy)?;
	c.remote("find", vec![json!(strategy), json!(selector), context, json!(multiple)]).await
}

pub(super) fn find_element(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { find(c, &args, "findElement", false, false).await })
}

pub(super) fn find_elements(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { find(c, &args, "findElements", false, true).await })
}

pub(super) fn find_element_from_element(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { find(c, &args, "findElementFromElement", true, false).await })
}

pub(super) fn find_elements_from_element(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { find(c, &args, "findElementsFromElement", true, true).await })
}

pub(super) fn click(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let id = string_arg(&args, 0, "click")?;
		c.remote("click", vec![json!(id)]).await
	})
}

pub(super) fn get_text(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let id = string_arg(&args, 0, "getText")?;
		c.remote("getText", vec![json!(id)]).await
	})
}

/// `(keys, elementId)`, where keys is a string or a list of strings.
pub(super) fn set_value(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let text = match args.first() {
			Some(Value::String(s)) => s.clone(),
			Some(Value::Array(keys)) => keys.iter().map(|k| k.as_str().map_or_else(|| k.to_string(), str::to_string)).collect(),
			_ => return Err(Error::InvalidArgument("setValue: keys must be a string or a list of strings".into())),
		};
		let id = string_arg(&args, 1, "setValue")?;
		c.remote("setValue", vec![json!(text), json!(id)]).await
	})
}

pub(super) fn clear(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let id = string_arg(&args, 0, "clear")?;
		c.remote("clear", vec![json!(id)]).await
	})
}

/// `(name, elementId)`.
pub(super) fn get_attribute(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let name = string_arg(&args, 0, "getAttribute")?;
		let id = string_arg(&args, 1, "getAttribute")?;
		c.remote("getAttribute", vec![json!(name), json!(id)]).await
	})
}

pub(super) fn element_displayed(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let id = string_arg(&args, 0, "elementDisplayed")?;
		c.remote("isDisplayed", vec![json!(id)]).await
	})
}
