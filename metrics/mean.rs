use super::StreamingMetric;
use num_traits::ToPrimitive;

/// The arithmetic mean of a stream of values. It finalizes to `None` if no values were seen.
#[derive(Debug, Default)]
pub struct Mean {
	n: u64,
	sum: f64,
}

impl Mean {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for Mean {
	type Input = f64;
	type Output = Option<f64>;

	fn update(&mut self, value: f64) {
		self.n += 1;
		self.sum += value;
	}

	fn merge(&mut self, other: Self) {
		self.n += other.n;
		self.sum += other.sum;
	}

	fn finalize(self) -> Option<f64> {
		match self.n {
			0 => None,
			n => n.to_f64().map(|n| self.sum / n),
		}
	}
}
