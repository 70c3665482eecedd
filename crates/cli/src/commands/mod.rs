mod exec;
mod resolve;
mod send;

use anyhow::Result;

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Resolve(args) => resolve::run(args).await,
		Commands::Send(args) => send::run(args).await,
		Commands::Exec(args) => exec::run(args).await,
	}
}
