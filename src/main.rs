use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::process::ExitCode;

use tracing::{debug, error};

use tish::config::{self, Config};
use tish::eval::{self, EvalResult};
use tish::global;
use tish::signal;

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<Vec<u8>>> {
	let mut line: Vec<u8> = vec![];
	if input.read_until(b'\n', &mut line)? == 0 {
		return Ok(None);
	}
	if line.last() == Some(&b'\n') {
		line.pop();
	}
	Ok(Some(line))
}

fn main() -> ExitCode {
	config::init_logging();
	let config = Config::new(argh::from_env());
	let interactive = config.force_interactive || io::stdin().is_terminal();

	if interactive {
		if let Err(e) = signal::install() {
			let argv0 = env::args().next().unwrap_or_else(|| "tish".to_string());
			eprintln!("{}: cannot register signal handler", argv0);
			debug!(error = %e, "sigaction failed");
			return ExitCode::FAILURE;
		}
	}

	let mut state = global::State::new();
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		if interactive {
			let _ = write!(stdout, "{} ", config.prompt);
			let _ = stdout.flush();
		}
		let line = match read_line(&mut stdin_locked) {
			Ok(Some(line)) => line,
			Ok(None) => {
				if interactive {
					let _ = writeln!(stdout);
				}
				break;
			},
			Err(e) => {
				error!(error = %e, "cannot read input");
				break;
			},
		};
		match eval::eval_bytes(&mut state, &line) {
			Ok(EvalResult::Continue) => {},
			Ok(EvalResult::Exit) => { break; },
			Err(e) => {
				debug!(error = %e, line = %String::from_utf8_lossy(&line), "command failed");
				if e.is_reported() {
					eprintln!("error: {}", e);
				}
			},
		}
	}
	ExitCode::SUCCESS
}
