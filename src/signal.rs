//! Interrupt forwarding and asynchronous reaping of background jobs.
//!
//! Handlers here run on signal delivery and may only touch `job::JOBS`
//! through its atomics and call async-signal-safe functions.

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::job::JOBS;

pub type Handler = extern "C" fn(libc::c_int);

extern "C" fn on_interrupt(signo: libc::c_int) {
	let saved = Errno::last_raw();
	unsafe {
		libc::write(libc::STDOUT_FILENO, b"\n".as_ptr() as *const libc::c_void, 1);
	}
	match JOBS.foreground() {
		Some(pid) => {
			let _ = Signal::try_from(signo).and_then(|sig| signal::kill(pid, sig));
		},
		None => unsafe { libc::_exit(0) },
	}
	Errno::set_raw(saved);
}

extern "C" fn on_child_state_change(_: libc::c_int) {
	let saved = Errno::last_raw();
	// The foreground wait reconciles background jobs itself once it returns.
	if JOBS.foreground().is_none() {
		JOBS.reap_background();
	}
	Errno::set_raw(saved);
}

fn register(sig: Signal, handler: Handler, flags: SaFlags) -> nix::Result<()> {
	let action = SigAction::new(SigHandler::Handler(handler), flags | SaFlags::SA_RESTART, SigSet::empty());
	unsafe { signal::sigaction(sig, &action) }?;
	Ok(())
}

/// Binds `handler` to the user interrupt (SIGINT).
pub fn register_abort_handler(handler: Handler) -> nix::Result<()> {
	register(Signal::SIGINT, handler, SaFlags::empty())
}

/// Binds `handler` to child termination (SIGCHLD).
pub fn register_child_state_handler(handler: Handler) -> nix::Result<()> {
	register(Signal::SIGCHLD, handler, SaFlags::SA_NOCLDSTOP)
}

pub fn install() -> nix::Result<()> {
	register_abort_handler(on_interrupt)?;
	register_child_state_handler(on_child_state_change)
}

fn child_signals() -> SigSet {
	let mut set = SigSet::empty();
	set.add(Signal::SIGCHLD);
	set
}

/// Holds SIGCHLD back until dropped.
///
/// Taken around a spawn so the handler never sees a child before the
/// tracker knows whether it is foreground or background.
#[derive(Debug)]
pub struct ChildSignalsBlocked {
	set: SigSet,
}

impl ChildSignalsBlocked {
	pub fn new() -> nix::Result<ChildSignalsBlocked> {
		let set = child_signals();
		set.thread_block()?;
		Ok(ChildSignalsBlocked { set: set })
	}
}

impl Drop for ChildSignalsBlocked {
	fn drop(&mut self) {
		let _ = self.set.thread_unblock();
	}
}

/// Restores default dispositions and the signal mask in a freshly forked child.
///
/// The Rust runtime ignores SIGPIPE in the interpreter, and an ignored
/// disposition survives exec.
pub fn reset_in_child() {
	let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
	for &sig in &[Signal::SIGINT, Signal::SIGCHLD, Signal::SIGPIPE] {
		let _ = unsafe { signal::sigaction(sig, &default) };
	}
	let _ = child_signals().thread_unblock();
}
