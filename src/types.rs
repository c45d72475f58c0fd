use std::os::unix::io::RawFd;

use crate::builtin::Builtin;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, OutputTruncate, OutputAppend }

impl RedirectType {
	pub fn from_operator(op: &str) -> Option<RedirectType> {
		match op {
			"<" => Some(RedirectType::Input),
			">" => Some(RedirectType::OutputTruncate),
			">>" => Some(RedirectType::OutputAppend),
			_ => None,
		}
	}

	/// Standard stream the redirection rebinds.
	pub fn fd(self) -> RawFd {
		match self {
			RedirectType::Input => libc::STDIN_FILENO,
			RedirectType::OutputTruncate | RedirectType::OutputAppend => libc::STDOUT_FILENO,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub target: String,
	pub typ: RedirectType,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stage {
	pub argv: Vec<String>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub redirect: Option<Redirect>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Job {
	pub pipeline: Pipeline,
	pub is_background: bool,
}

/// What a tokenized line asks the interpreter to do.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
	Noop,
	Builtin(Builtin),
	Execute(Vec<String>),
}
