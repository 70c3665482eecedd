//! Session-wide engine commands.

use serde_json::{Value, json};

use super::{CommandFuture, string_arg};
use crate::controller::SessionController;
use crate::error::Error;

pub(super) fn get_page_source(c: &mut SessionController, _args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { c.remote("source", vec![]).await })
}

pub(super) fn get_screenshot(c: &mut SessionController, _args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { c.remote("screenshot", vec![]).await })
}

pub(super) fn get_window_size(c: &mut SessionController, _args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { c.remote("getWindowSize", vec![]).await })
}

pub(super) fn set_time_dilation(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let value = args.into_iter().next().unwrap_or(Value::Null);
		c.set_time_dilation(&value).await
	})
}

pub(super) fn set_source_tree_filter(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let filter = string_arg(&args, 0, "setSourceTreeFilter")?;
		c.set_source_tree_filter(&Value::String(filter)).await
	})
}

pub(super) fn update_settings(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		match args.into_iter().next() {
			Some(Value::Object(update)) => {
				c.update_settings(update).await?;
				Ok(Value::Null)
			}
			other => Err(Error::InvalidArgument(format!(
				"updateSettings expects an object of settings, got {}",
				other.unwrap_or(Value::Null)
			))),
		}
	})
}

pub(super) fn get_settings(c: &mut SessionController, _args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move { Ok(Value::Object(c.settings().as_map().clone())) })
}

/// `(status, value)` of a finished asynchronous script.
pub(super) fn receive_async_response(c: &mut SessionController, args: Vec<Value>) -> CommandFuture<'_> {
	Box::pin(async move {
		let mut args = args.into_iter();
		let status = args.next().unwrap_or(Value::Null);
		let value = args.next().unwrap_or(Value::Null);
		c.record_async_response(json!({"status": status, "value": value}));
		Ok(Value::Null)
	})
}
