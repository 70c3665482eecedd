use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};
use youi::{Capabilities, SessionController};
use youi_runtime::AppResolver;

use crate::cli::ExecArgs;

pub async fn run(args: ExecArgs) -> Result<()> {
	let caps = Capabilities {
		platform_name: Some(args.platform.clone()),
		app: args.app.clone().map(Value::String),
		youi_engine_app_address: Some(args.engine.address.clone()),
		youi_engine_app_port: args.engine.port,
		full_source_tree: Some(args.full_source_tree),
		// One command per process; no idle timer needed.
		new_command_timeout: Some(0),
		..Capabilities::default()
	};

	let mut controller = SessionController::builder()
		.resolver(Arc::new(AppResolver::new()))
		.transport(args.engine.transport_config())
		.build();

	let session_id = controller.create_session(caps).await?;
	info!(session_id = %session_id, "Running '{}'", args.command);

	let result = controller.execute_command(&args.command, parse_args(&args.args)).await;
	if let Err(e) = controller.delete_session().await {
		warn!("Failed to delete session {session_id}: {e}");
	}

	let value = result?;
	println!("{}", serde_json::to_string_pretty(&value)?);
	Ok(())
}

/// JSON where it parses, plain strings otherwise.
fn parse_args(raw: &[String]) -> Vec<Value> {
	raw.iter()
		.map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
		.collect()
}
