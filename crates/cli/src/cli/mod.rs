
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use youi_protocol::DEFAULT_APP_PORT;
use youi_runtime::{Endpoint, TransportConfig};

/// Extensions accepted by `resolve` when none are given.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".app", ".apk", ".ipa"];

#[derive(Parser, Debug)]
#[command(name = "youi")]
#[command(about = "Resolve app bundles and talk to running You.i Engine apps")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Resolve a local path or http(s) URL to an installable app and print its path.
	Resolve(ResolveArgs),
	/// Send one raw JSON command to a running app and print the reply.
	Send(SendArgs),
	/// Run one WebDriver command in a short-lived session.
	Exec(ExecArgs),
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
	/// Path or URL of an app, or of a zip archive containing one
	pub app: String,

	/// Accepted app extension; repeat for several (default: .app, .apk, .ipa)
	#[arg(short = 'e', long = "ext", value_name = "EXT")]
	pub extensions: Vec<String>,

	/// Directory for downloads and extracted archives
	#[arg(long, value_name = "DIR")]
	pub scratch_dir: Option<PathBuf>,
}

impl ResolveArgs {
	pub fn accepted_extensions(&self) -> Vec<String> {
		if self.extensions.is_empty() {
			DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
		} else {
			self.extensions.clone()
		}
	}
}

/// Where the app listens and how hard to try reaching it.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
	/// Address of the device or host running the app
	#[arg(long, env = "YOUI_APP_ADDRESS", default_value = "127.0.0.1")]
	pub address: String,

	/// Engine port (platform default when omitted)
	#[arg(long, env = "YOUI_APP_PORT")]
	pub port: Option<u16>,

	/// Seconds a connect or read may stay idle
	#[arg(long, value_name = "SECS", default_value_t = 10)]
	pub timeout: u64,

	/// Connect and send attempts before giving up
	#[arg(long, default_value_t = 3)]
	pub attempts: u32,
}

impl EngineArgs {
	pub fn transport_config(&self) -> TransportConfig {
		TransportConfig::default()
			.with_max_attempts(self.attempts)
			.with_idle_timeout(Duration::from_secs(self.timeout))
	}

	pub fn endpoint(&self) -> Endpoint {
		Endpoint::new(self.address.clone(), self.port.unwrap_or(DEFAULT_APP_PORT))
	}
}

#[derive(Args, Debug)]
pub struct SendArgs {
	#[command(flatten)]
	pub engine: EngineArgs,

	/// Command line, e.g. '{"cmd":"action","action":"source","params":[]}'
	pub line: String,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
	#[command(flatten)]
	pub engine: EngineArgs,

	/// platformName of the session
	#[arg(long, env = "YOUI_PLATFORM", default_value = "noproxy")]
	pub platform: String,

	/// App path or URL, for platforms that need one
	#[arg(long)]
	pub app: Option<String>,

	/// Keep the full element tree instead of displayed elements only
	#[arg(long)]
	pub full_source_tree: bool,

	/// WebDriver command name, e.g. getPageSource
	pub command: String,

	/// Arguments, each parsed as JSON and passed as a string otherwise
	pub args: Vec<String>,
}
