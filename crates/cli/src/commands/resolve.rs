use anyhow::Result;
use tracing::info;
use youi_runtime::AppResolver;

use crate::cli::ResolveArgs;

pub async fn run(args: ResolveArgs) -> Result<()> {
	let mut resolver = AppResolver::new();
	if let Some(dir) = &args.scratch_dir {
		resolver = resolver.with_scratch_root(dir);
	}

	let accepted = args.accepted_extensions();
	let path = resolver.resolve(&args.app, &accepted).await?;
	info!("Resolved '{}' to {}", args.app, path.display());

	println!("{}", path.display());
	Ok(())
}
