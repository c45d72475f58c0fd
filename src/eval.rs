use std::convert::Infallible;
use std::ffi::{self, CString};
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::path::PathBuf;

use nix::errno::Errno;
use nix::unistd;
use thiserror::Error;
use tracing::debug;

use crate::builtin;
use crate::global;
use crate::job::{self, SpawnResult};
use crate::parser::{self, ParseError};
use crate::signal;
use crate::types::*;

/// Failure inside a forked process, reported there before it exits.
#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{}", .0.desc())]
	Nix(#[from] Errno),
	#[error("{}", describe_io(.0))]
	Io(#[from] io::Error),
	#[error("argument contains a nul byte")]
	Nul(#[from] ffi::NulError),
	#[error("empty command")]
	EmptyCommand,
}

fn describe_io(e: &io::Error) -> String {
	match e.raw_os_error() {
		Some(code) => Errno::from_raw(code).desc().to_string(),
		None => e.to_string(),
	}
}

/// Failure seen by the interpreter itself.
#[derive(Debug, Error)]
pub enum EvalError {
	#[error("cannot change directory to {}: {}", .path.display(), .source.desc())]
	ChangeDirectory { path: PathBuf, source: Errno },
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error("{}", .0.desc())]
	Launch(#[from] Errno),
	#[error("cannot write output: {}", describe_io(.0))]
	Output(#[from] io::Error),
}

impl EvalError {
	/// A failed `cd` is only a result code; everything else gets an `error:` line.
	pub fn is_reported(&self) -> bool {
		!matches!(*self, EvalError::ChangeDirectory { .. })
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EvalResult {
	Continue,
	Exit,
}

fn exec_or_exit(r: Result<Infallible, ExecError>) -> ! {
	let e = match r {
		Ok(never) => match never {},
		Err(e) => e,
	};
	let _ = writeln!(io::stderr(), "error: {}", e);
	unsafe { libc::_exit(1) }
}

fn apply_redirect(redirect: &Redirect) -> Result<(), ExecError> {
	let mut oopt = fs::OpenOptions::new();
	let _ = match redirect.typ {
		RedirectType::Input => oopt.read(true),
		RedirectType::OutputTruncate => oopt.write(true).create(true).truncate(true),
		RedirectType::OutputAppend => oopt.append(true).create(true),
	};
	let file = oopt.mode(0o666).open(&redirect.target)?;
	unistd::dup2(file.as_raw_fd(), redirect.typ.fd())?;
	Ok(())
}

fn exec_argv(argv: &[String]) -> Result<Infallible, ExecError> {
	let argv: Vec<CString> = argv.iter().map(|a| CString::new(a.as_bytes())).collect::<Result<_, _>>()?;
	let name = argv.first().ok_or(ExecError::EmptyCommand)?;
	Ok(unistd::execvp(name.as_c_str(), &argv)?)
}

fn bind_stdout(write: OwnedFd) -> Result<(), ExecError> {
	unistd::dup2(write.as_raw_fd(), libc::STDOUT_FILENO)?;
	Ok(())
}

fn run_stage(stage: &Stage, read: OwnedFd, write: OwnedFd) -> ! {
	drop(read);
	exec_or_exit(bind_stdout(write).and_then(|()| exec_argv(&stage.argv)))
}

/// Spawns every stage but the last, each feeding the next through a pipe,
/// then becomes the last stage.
fn wire_pipeline(pipeline: &Pipeline) -> Result<Infallible, ExecError> {
	if let Some(ref redirect) = pipeline.redirect {
		apply_redirect(redirect)?;
	}
	let (last, upstream) = pipeline.stages.split_last().ok_or(ExecError::EmptyCommand)?;
	for stage in upstream {
		let (read, write) = unistd::pipe()?;
		match job::spawn(stage)? {
			SpawnResult::ChildShouldExec(stage) => run_stage(stage, read, write),
			SpawnResult::ParentContinues(_) => {
				unistd::dup2(read.as_raw_fd(), libc::STDIN_FILENO)?;
				drop(read);
				drop(write);
			},
		}
	}
	exec_argv(&last.argv)
}

fn run_pipeline(pipeline: &Pipeline) -> ! {
	signal::reset_in_child();
	exec_or_exit(wire_pipeline(pipeline))
}

fn launch(state: &mut global::State, job: &Job) -> Result<(), EvalError> {
	let blocked = signal::ChildSignalsBlocked::new()?;
	let pid = match job::spawn_group_leader(&job.pipeline)? {
		SpawnResult::ChildShouldExec(pipeline) => run_pipeline(pipeline),
		SpawnResult::ParentContinues(pid) => pid,
	};

	if job.is_background {
		state.jobs.add_background();
		drop(blocked);
		debug!(pid = pid.as_raw(), stages = job.pipeline.stages.len(), "started background job");
		writeln!(io::stdout(), "{}", pid)?;
		return Ok(());
	}

	state.jobs.set_foreground(pid);
	drop(blocked);
	debug!(pid = pid.as_raw(), stages = job.pipeline.stages.len(), "waiting for foreground job");
	let waited = job::wait_foreground(pid);
	state.jobs.clear_foreground();
	let reaped = state.jobs.reap_background();
	if reaped > 0 {
		debug!(reaped, outstanding = state.jobs.background_count(), "reaped background jobs");
	}
	state.last_status = waited?;
	debug!(pid = pid.as_raw(), status = %state.last_status, "foreground job finished");
	Ok(())
}

/// Runs one input line to completion, or until a background job is started.
pub fn eval(state: &mut global::State, line: &str) -> Result<EvalResult, EvalError> {
	match parser::classify(parser::tokenize(line)) {
		Command::Noop => Ok(EvalResult::Continue),
		Command::Builtin(ref b) => builtin::run(state, b),
		Command::Execute(args) => {
			let job = parser::build_job(args)?;
			launch(state, &job)?;
			Ok(EvalResult::Continue)
		},
	}
}

/// Like `eval`, for a raw line that has not been decoded yet.
pub fn eval_bytes(state: &mut global::State, line: &[u8]) -> Result<EvalResult, EvalError> {
	eval(state, parser::decode(line)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;

	#[test]
	fn os_errors_render_as_bare_reason() {
		let e = ExecError::from(Errno::ENOENT);
		assert_eq!(e.to_string(), "No such file or directory");
		let e = ExecError::from(io::Error::from_raw_os_error(libc::EACCES));
		assert_eq!(e.to_string(), "Permission denied");
	}

	#[test]
	fn only_cd_failures_are_silent() {
		let cd = EvalError::ChangeDirectory { path: PathBuf::from("/nowhere"), source: Errno::ENOENT };
		assert!(!cd.is_reported());
		assert!(EvalError::from(ParseError::EmptyStage).is_reported());
		assert_eq!(EvalError::from(ParseError::EmptyStage).to_string(), "empty command in pipeline");
	}

	#[test]
	#[serial]
	fn noop_lines_leave_tracker_untouched() {
		let mut state = global::State::new();
		let before = (state.jobs.foreground(), state.jobs.background_count());
		for line in &["", "   ", "\t", "# sleep 5 &", "#"] {
			assert_eq!(eval(&mut state, line).unwrap(), EvalResult::Continue);
		}
		assert_eq!((state.jobs.foreground(), state.jobs.background_count()), before);
		assert_eq!(state.last_status, job::Status::default());
	}

	#[test]
	fn malformed_pipeline_is_rejected_before_spawning() {
		let mut state = global::State::new();
		assert!(matches!(eval(&mut state, "ls | | wc"), Err(EvalError::Parse(ParseError::EmptyStage))));
		assert!(matches!(eval(&mut state, "&"), Err(EvalError::Parse(ParseError::EmptyCommand))));
		assert_eq!(eval(&mut state, "exit").unwrap(), EvalResult::Exit);
	}

	#[test]
	fn undecodable_line_is_rejected_before_spawning() {
		let mut state = global::State::new();
		let r = eval_bytes(&mut state, b"cat \xff.txt");
		assert!(matches!(r, Err(EvalError::Parse(ParseError::InvalidUtf8))));
		assert_eq!(eval_bytes(&mut state, b"exit").unwrap(), EvalResult::Exit);
	}

	#[test]
	fn output_errors_are_reported() {
		let e = EvalError::from(io::Error::from_raw_os_error(libc::EPIPE));
		assert!(e.is_reported());
		assert_eq!(e.to_string(), "cannot write output: Broken pipe");
	}
}
