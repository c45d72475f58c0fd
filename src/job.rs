use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

/// How the last foreground job ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
	Exited(i32),
	Signaled(Signal),
}

impl Default for Status {
	fn default() -> Status {
		Status::Exited(0)
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Status::Exited(code) => write!(f, "{}", code),
			Status::Signaled(sig) => write!(f, "terminated by signal {}", sig as i32),
		}
	}
}

trait WaitStatusExt {
	fn termination(self) -> Option<Status>;
}

impl WaitStatusExt for WaitStatus {
	fn termination(self) -> Option<Status> {
		match self {
			WaitStatus::Exited(_, code) => Some(Status::Exited(code)),
			WaitStatus::Signaled(_, sig, _) => Some(Status::Signaled(sig)),
			_ => None,
		}
	}
}

/// Foreground pid and outstanding background count, shared with the signal handlers.
///
/// Every field is a plain atomic so the handlers can read and update it
/// without locking or allocating.
#[derive(Debug)]
pub struct JobTracker {
	foreground: AtomicI32,
	background: AtomicUsize,
}

pub static JOBS: JobTracker = JobTracker::new();

impl JobTracker {
	pub const fn new() -> JobTracker {
		JobTracker { foreground: AtomicI32::new(0), background: AtomicUsize::new(0) }
	}

	pub fn foreground(&self) -> Option<Pid> {
		match self.foreground.load(Ordering::SeqCst) {
			0 => None,
			pid => Some(Pid::from_raw(pid)),
		}
	}

	pub fn set_foreground(&self, pid: Pid) {
		self.foreground.store(pid.as_raw(), Ordering::SeqCst);
	}

	pub fn clear_foreground(&self) {
		self.foreground.store(0, Ordering::SeqCst);
	}

	pub fn background_count(&self) -> usize {
		self.background.load(Ordering::SeqCst)
	}

	pub fn add_background(&self) {
		self.background.fetch_add(1, Ordering::SeqCst);
	}

	fn release_background(&self) -> bool {
		self.background
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok()
	}

	/// Collects finished background children without blocking.
	///
	/// Makes at most as many attempts as there are outstanding background
	/// jobs and decrements the count only for children actually reaped.
	/// Async-signal-safe.
	pub fn reap_background(&self) -> usize {
		let mut reaped = 0;
		for _ in 0 .. self.background_count() {
			match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::StillAlive) | Err(_) => {},
				Ok(_) => {
					if self.release_background() {
						reaped += 1;
					}
				},
			}
		}
		reaped
	}
}

/// The two sides of a fork, as a value instead of a branch inside shared code.
#[derive(Debug)]
pub enum SpawnResult<T> {
	ParentContinues(Pid),
	ChildShouldExec(T),
}

/// Forks, handing `payload` to the child side.
///
/// The child must diverge (exec or `_exit`) rather than return into the
/// interpreter's control flow.
pub fn spawn<T>(payload: T) -> nix::Result<SpawnResult<T>> {
	// The interpreter never starts threads, so the child may allocate before exec.
	match unsafe { unistd::fork() }? {
		ForkResult::Parent { child } => Ok(SpawnResult::ParentContinues(child)),
		ForkResult::Child => Ok(SpawnResult::ChildShouldExec(payload)),
	}
}

/// Like `spawn`, and the child becomes leader of a new process group.
///
/// `setpgid` runs on both sides so the group exists whichever side is
/// scheduled first.
pub fn spawn_group_leader<T>(payload: T) -> nix::Result<SpawnResult<T>> {
	let r = spawn(payload)?;
	let pid = match &r {
		SpawnResult::ParentContinues(child) => *child,
		SpawnResult::ChildShouldExec(_) => Pid::from_raw(0),
	};
	let _ = unistd::setpgid(pid, pid);
	Ok(r)
}

/// Blocks until `pid` terminates.
pub fn wait_foreground(pid: Pid) -> nix::Result<Status> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status) => if let Some(s) = status.termination() {
				return Ok(s);
			},
			Err(Errno::EINTR) => {},
			Err(e) => { return Err(e); },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;
	use std::process;
	use std::thread::sleep;
	use std::time::{Duration, Instant};

	#[test]
	fn foreground_slot_goes_idle_waiting_idle() {
		let t = JobTracker::new();
		assert_eq!(t.foreground(), None);
		t.set_foreground(Pid::from_raw(4242));
		assert_eq!(t.foreground(), Some(Pid::from_raw(4242)));
		t.clear_foreground();
		assert_eq!(t.foreground(), None);
	}

	#[test]
	fn background_count_never_goes_negative() {
		let t = JobTracker::new();
		assert!(!t.release_background());
		assert_eq!(t.background_count(), 0);
		t.add_background();
		assert!(t.release_background());
		assert!(!t.release_background());
		assert_eq!(t.background_count(), 0);
	}

	#[test]
	#[serial]
	fn reap_without_children_leaves_count_alone() {
		let t = JobTracker::new();
		t.add_background();
		assert_eq!(t.reap_background(), 0);
		assert_eq!(t.background_count(), 1);
	}

	#[test]
	#[serial]
	fn reaping_converges_to_outstanding_jobs() {
		let t = JobTracker::new();
		for _ in 0 .. 2 {
			process::Command::new("true").spawn().unwrap();
			t.add_background();
		}
		let deadline = Instant::now() + Duration::from_secs(5);
		while t.background_count() > 0 && Instant::now() < deadline {
			t.reap_background();
			sleep(Duration::from_millis(20));
		}
		assert_eq!(t.background_count(), 0);
		assert_eq!(t.reap_background(), 0);
	}

	#[test]
	fn status_formats_exit_code_or_signal() {
		assert_eq!(Status::default().to_string(), "0");
		assert_eq!(Status::Exited(3).to_string(), "3");
		assert_eq!(Status::Signaled(Signal::SIGINT).to_string(), "terminated by signal 2");
	}

	#[test]
	fn wait_status_maps_to_termination() {
		let pid = Pid::from_raw(1);
		assert_eq!(WaitStatus::Exited(pid, 1).termination(), Some(Status::Exited(1)));
		assert_eq!(WaitStatus::Signaled(pid, Signal::SIGKILL, false).termination(), Some(Status::Signaled(Signal::SIGKILL)));
		assert_eq!(WaitStatus::StillAlive.termination(), None);
	}
}
