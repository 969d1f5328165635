use num_traits::ToPrimitive;
use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/// A `ProgressCounter` is a cheaply cloneable handle to a shared count of completed units of work out of a known `total`. The learner increments it while a reporter on another thread reads it.
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}

	/// The fraction of the work completed so far, or `1.0` if there was no work to do.
	pub fn fraction(&self) -> f64 {
		if self.total == 0 {
			return 1.0;
		}
		let current = self.get().min(self.total).to_f64().unwrap_or(0.0);
		current / self.total.to_f64().unwrap_or(1.0)
	}
}

#[test]
fn test_progress_counter() {
	let counter = ProgressCounter::new(4);
	let clone = counter.clone();
	clone.inc(1);
	counter.inc(2);
	assert_eq!(counter.get(), 3);
	assert!((clone.fraction() - 0.75).abs() < std::f64::EPSILON);
	assert!((ProgressCounter::new(0).fraction() - 1.0).abs() < std::f64::EPSILON);
}
