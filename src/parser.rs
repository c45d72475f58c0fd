use thiserror::Error;

use crate::builtin;
use crate::types::*;

const PIPE: &str = "|";
const BACKGROUND: &str = "&";

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("empty command in pipeline")]
	EmptyStage,
	#[error("input line is not valid UTF-8")]
	InvalidUtf8,
}

type ParseResult<T> = Result<T, ParseError>;

/// Undecodable bytes are an error, never replaced.
pub fn decode(line: &[u8]) -> ParseResult<&str> {
	std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)
}

pub fn tokenize(line: &str) -> Vec<String> {
	line.split_whitespace().map(str::to_owned).collect()
}

pub fn classify(args: Vec<String>) -> Command {
	match args.first() {
		None => return Command::Noop,
		Some(name) if name.starts_with('#') => return Command::Noop,
		Some(_) => {},
	}
	match builtin::match_builtin(&args) {
		Some(b) => Command::Builtin(b),
		None => Command::Execute(args),
	}
}

fn strip_background(args: &mut Vec<String>) -> bool {
	if args.last().map(String::as_str) == Some(BACKGROUND) {
		args.pop();
		true
	} else {
		false
	}
}

/// Pulls a `<`, `>` or `>>` binding off the last two tokens, if they form one.
pub fn take_redirect(args: &mut Vec<String>) -> Option<Redirect> {
	let len = args.len();
	if len < 2 {
		return None;
	}
	let typ = RedirectType::from_operator(&args[len - 2])?;
	let target = args.pop()?;
	args.pop();
	Some(Redirect { target: target, typ: typ })
}

pub fn split_pipeline(args: Vec<String>, redirect: Option<Redirect>) -> ParseResult<Pipeline> {
	if args.is_empty() {
		return Err(ParseError::EmptyCommand);
	}
	let mut stages: Vec<Stage> = vec![];
	let mut argv: Vec<String> = vec![];
	for arg in args {
		if arg == PIPE {
			if argv.is_empty() {
				return Err(ParseError::EmptyStage);
			}
			stages.push(Stage { argv: std::mem::take(&mut argv) });
		} else {
			argv.push(arg);
		}
	}
	if argv.is_empty() {
		return Err(ParseError::EmptyStage);
	}
	stages.push(Stage { argv: argv });
	Ok(Pipeline { stages: stages, redirect: redirect })
}

pub fn build_job(mut args: Vec<String>) -> ParseResult<Job> {
	let is_background = strip_background(&mut args);
	let redirect = take_redirect(&mut args);
	let pipeline = split_pipeline(args, redirect)?;
	Ok(Job { pipeline: pipeline, is_background: is_background })
}
