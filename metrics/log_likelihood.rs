use super::StreamingMetric;
use num_traits::ToPrimitive;

/**
The `LogLikelihood` metric scores a set of leaves, each holding counts of positive and negative bags and a probability that a bag reaching it is positive. Each leaf contributes `positive_count * ln(p) + negative_count * ln(1 - p)`, where a term with a zero count contributes nothing, so a leaf with `p = 1` and no negatives scores `0` rather than `NaN`. Higher is better, and the maximum is `0`.
*/
#[derive(Debug, Default)]
pub struct LogLikelihood(f64);

#[derive(Clone, Copy, Debug)]
pub struct LogLikelihoodInput {
	pub positive_count: u64,
	pub negative_count: u64,
	pub probability: f64,
}

impl LogLikelihood {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for LogLikelihood {
	type Input = LogLikelihoodInput;
	type Output = f64;

	fn update(&mut self, input: LogLikelihoodInput) {
		if input.positive_count > 0 {
			self.0 += input.positive_count.to_f64().unwrap_or(0.0) * input.probability.ln();
		}
		if input.negative_count > 0 {
			self.0 += input.negative_count.to_f64().unwrap_or(0.0) * (1.0 - input.probability).ln();
		}
	}

	fn merge(&mut self, other: Self) {
		self.0 += other.0;
	}

	fn finalize(self) -> f64 {
		self.0
	}
}

#[test]
fn test_log_likelihood() {
	let mut metric = LogLikelihood::new();
	metric.update(LogLikelihoodInput {
		positive_count: 3,
		negative_count: 1,
		probability: 0.75,
	});
	metric.update(LogLikelihoodInput {
		positive_count: 0,
		negative_count: 4,
		probability: 0.0,
	});
	let expected = 3.0 * 0.75f64.ln() + 0.25f64.ln();
	assert!((metric.finalize() - expected).abs() < 1e-12);
}

#[test]
fn test_log_likelihood_certain_leaf() {
	let mut metric = LogLikelihood::new();
	metric.update(LogLikelihoodInput {
		positive_count: 5,
		negative_count: 0,
		probability: 1.0,
	});
	assert_eq!(metric.finalize(), 0.0);
}
