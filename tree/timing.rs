use num_traits::ToPrimitive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct Timing {
	pub propagate: TimingDuration,
	pub fit_split: TimingDuration,
	pub update_probabilities: TimingDuration,
	pub verify: TimingDuration,
	pub total: TimingDuration,
}

pub struct TimingDuration(AtomicU64);

impl Timing {
	pub fn new() -> Timing {
		Timing {
			propagate: TimingDuration::new(),
			fit_split: TimingDuration::new(),
			update_probabilities: TimingDuration::new(),
			verify: TimingDuration::new(),
			total: TimingDuration::new(),
		}
	}
}

impl TimingDuration {
	pub fn new() -> Self {
		Self(AtomicU64::new(0))
	}

	pub fn get(&self) -> Duration {
		Duration::from_nanos(self.0.load(Ordering::Relaxed))
	}

	pub fn inc(&self, value: Duration) -> u64 {
		self.0.fetch_add(
			value.as_nanos().to_u64().unwrap_or(u64::MAX),
			Ordering::Relaxed,
		)
	}
}

impl std::fmt::Debug for TimingDuration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.get())
	}
}
