use anyhow::{Context, Result};
use youi_runtime::SocketTransport;

use crate::cli::SendArgs;

pub async fn run(args: SendArgs) -> Result<()> {
	let endpoint = args.engine.endpoint();
	let mut transport = SocketTransport::new(endpoint.clone()).with_config(args.engine.transport_config());

	transport
		.connect()
		.await
		.with_context(|| format!("no app listening on {endpoint}"))?;
	let reply = transport.send(&args.line).await;
	transport.close().await;

	println!("{}", String::from_utf8_lossy(&reply?));
	Ok(())
}
