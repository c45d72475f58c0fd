use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use nix::unistd;
use tracing::debug;

use crate::eval::{EvalError, EvalResult};
use crate::global;

const HOME_KEY: &str = "HOME";

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Builtin {
	Exit,
	Status,
	ChangeDirectory(Option<String>),
}

pub fn builtin_cd(_: &mut global::State, target: Option<&str>) -> Result<EvalResult, EvalError> {
	let path = match target {
		Some(path) => PathBuf::from(path),
		None => match env::var_os(HOME_KEY) {
			Some(home) => PathBuf::from(home),
			None => {
				debug!("cd: {} is not set, staying put", HOME_KEY);
				return Ok(EvalResult::Continue);
			},
		},
	};
	unistd::chdir(path.as_path()).map_err(|e| EvalError::ChangeDirectory { path: path.clone(), source: e })?;
	Ok(EvalResult::Continue)
}

pub fn builtin_status(state: &mut global::State) -> Result<EvalResult, EvalError> {
	writeln!(io::stdout(), "{}", state.last_status)?;
	Ok(EvalResult::Continue)
}

pub fn match_builtin(args: &[String]) -> Option<Builtin> {
	let name = args.first()?;
	match (name.as_str(), args.len()) {
		("exit", 1) => Some(Builtin::Exit),
		("status", 1) => Some(Builtin::Status),
		("cd", _) => Some(Builtin::ChangeDirectory(args.get(1).cloned())),
		_ => None,
	}
}

pub fn run(state: &mut global::State, builtin: &Builtin) -> Result<EvalResult, EvalError> {
	match *builtin {
		Builtin::Exit => Ok(EvalResult::Exit),
		Builtin::Status => builtin_status(state),
		Builtin::ChangeDirectory(ref target) => builtin_cd(state, target.as_deref()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;

	fn args(words: &[&str]) -> Vec<String> {
		words.iter().map(|w| w.to_string()).collect()
	}

	#[test]
	fn match_builtin_requires_exact_arity() {
		assert_eq!(match_builtin(&args(&["exit"])), Some(Builtin::Exit));
		assert_eq!(match_builtin(&args(&["exit", "0"])), None);
		assert_eq!(match_builtin(&args(&["status"])), Some(Builtin::Status));
		assert_eq!(match_builtin(&args(&["ls"])), None);
		assert_eq!(match_builtin(&[]), None);
	}

	#[test]
	#[serial]
	fn cd_changes_directory_and_reports_failure() {
		let orig = env::current_dir().unwrap();
		let dir = tempfile::tempdir().unwrap();
		let mut state = global::State::new();

		let target = dir.path().to_str().unwrap().to_string();
		let r = run(&mut state, &Builtin::ChangeDirectory(Some(target)));
		assert!(matches!(r, Ok(EvalResult::Continue)));
		assert_eq!(env::current_dir().unwrap().canonicalize().unwrap(), dir.path().canonicalize().unwrap());

		let missing = dir.path().join("missing").to_str().unwrap().to_string();
		let r = run(&mut state, &Builtin::ChangeDirectory(Some(missing)));
		assert!(matches!(r, Err(EvalError::ChangeDirectory { .. })));

		env::set_current_dir(orig).unwrap();
	}

	#[test]
	#[serial]
	fn cd_without_home_is_a_noop() {
		let orig = env::current_dir().unwrap();
		let home = env::var_os(HOME_KEY);
		env::remove_var(HOME_KEY);

		let mut state = global::State::new();
		let r = run(&mut state, &Builtin::ChangeDirectory(None));
		assert!(matches!(r, Ok(EvalResult::Continue)));
		assert_eq!(env::current_dir().unwrap(), orig);

		if let Some(home) = home {
			env::set_var(HOME_KEY, home);
		}
	}
}
