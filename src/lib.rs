//! Engine of `tish`: tokenizes a command line, runs built-ins, and launches
//! external pipelines in the foreground or background.

pub mod builtin;
pub mod config;
pub mod eval;
pub mod global;
pub mod job;
pub mod parser;
pub mod signal;
pub mod types;
