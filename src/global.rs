use crate::job;

pub struct State {
	pub last_status: job::Status,
	pub jobs: &'static job::JobTracker,
}

impl State {
	pub fn new() -> State {
		State { last_status: job::Status::default(), jobs: &job::JOBS }
	}
}

impl Default for State {
	fn default() -> State {
		State::new()
	}
}
