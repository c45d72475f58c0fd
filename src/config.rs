use std::env;

use argh::FromArgs;
use tracing_subscriber::EnvFilter;

const DEFAULT_PROMPT: &str = ">>";
const PROMPT_KEY: &str = "TISH_PROMPT";
const LOG_KEY: &str = "TISH_LOG";
const DEFAULT_LOG: &str = "warn";

/// A small interactive shell with pipes, redirection and background jobs.
#[derive(Debug, FromArgs)]
pub struct Args {
	/// prompt and handle interrupts even when stdin is not a terminal
	#[argh(switch, short = 'i')]
	pub interactive: bool,

	/// prompt string (default: $TISH_PROMPT or ">>")
	#[argh(option)]
	pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub prompt: String,
	pub force_interactive: bool,
}

impl Config {
	pub fn new(args: Args) -> Config {
		let prompt = args.prompt
			.or_else(|| env::var(PROMPT_KEY).ok())
			.unwrap_or_else(|| DEFAULT_PROMPT.to_string());
		Config { prompt: prompt, force_interactive: args.interactive }
	}
}

/// Installs the stderr log subscriber, filtered by `TISH_LOG`.
pub fn init_logging() {
	let filter = EnvFilter::try_from_env(LOG_KEY).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.without_time()
		.try_init();
}
