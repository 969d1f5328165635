use crate::{
	bag::{Bag, LeafCount},
	error::{Error, Result},
	probabilities::log_likelihood,
	stats::Multinomial,
	tree::Tree,
};
use concuno_util::progress_counter::ProgressCounter;
use num_traits::ToPrimitive;
use rand::Rng;

/**
Estimate how likely it is that `candidate` does not score better than `previous` on `bags`.

Each tree's leaves claim the bags as in [`Tree::max_leaf_counts`](../tree/struct.Tree.html#method.max_leaf_counts). The observed fraction of bags with each label at each leaf defines a multinomial, and every trial draws a resample of the bags from each tree's multinomial and scores both with their leaves' probabilities. The returned p value is the fraction of trials where the candidate did not score strictly higher.
*/
pub fn bootstrap_p_value<E, R: Rng + ?Sized>(
	previous: &Tree<E>,
	candidate: &Tree<E>,
	bags: &[Bag<E>],
	trial_count: usize,
	rng: &mut R,
	progress_counter: &ProgressCounter,
) -> Result<f64> {
	if bags.is_empty() {
		return Err(Error::NoValidationBags);
	}
	let bag_count = bags.len().to_u64().unwrap_or(0);
	let mut previous = Resampler::new(previous.max_leaf_counts(bags)?, bag_count)?;
	let mut candidate = Resampler::new(candidate.max_leaf_counts(bags)?, bag_count)?;
	let mut wins = 0usize;
	for _ in 0..trial_count {
		let previous_score = previous.sample_score(rng)?;
		let candidate_score = candidate.sample_score(rng)?;
		if candidate_score > previous_score {
			wins += 1;
		}
		progress_counter.inc(1);
	}
	let trial_count = trial_count.to_f64().unwrap_or(0.0);
	if trial_count == 0.0 {
		return Ok(1.0);
	}
	Ok(1.0 - wins.to_f64().unwrap_or(0.0) / trial_count)
}

/// Draws resampled leaf counts for one tree. Leaf `i` has its negative count in class `2 * i` and its positive count in class `2 * i + 1`.
struct Resampler {
	counts: Vec<LeafCount>,
	multinomial: Multinomial,
	sample: Vec<u64>,
}

impl Resampler {
	fn new(counts: Vec<LeafCount>, bag_count: u64) -> Result<Self> {
		let total = bag_count.to_f64().unwrap_or(1.0);
		let probabilities: Vec<f64> = counts
			.iter()
			.flat_map(|count| {
				vec![
					count.negative_count.to_f64().unwrap_or(0.0) / total,
					count.positive_count.to_f64().unwrap_or(0.0) / total,
				]
			})
			.collect();
		let multinomial = Multinomial::new(bag_count, &probabilities)?;
		Ok(Self {
			sample: vec![0; probabilities.len()],
			counts,
			multinomial,
		})
	}

	fn sample_score<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<f64> {
		self.multinomial.sample(rng, &mut self.sample)?;
		for (count, sample) in self.counts.iter_mut().zip(self.sample.chunks(2)) {
			count.negative_count = sample[0];
			count.positive_count = sample[1];
		}
		Ok(log_likelihood(&self.counts))
	}
}
