use crate::{
	error::{Error, Result},
	predicate::{DistanceThreshold, MahalanobisDistance},
	propagate::PointBag,
	stats::{mean_of_points, Gaussian},
	threshold::{choose_threshold, BagDistance, ThresholdChoice},
};
use ndarray::prelude::*;

/// These options control how a split's center and threshold are searched for.
#[derive(Clone, Debug)]
pub struct SplitModelOptions {
	/// Only the first this many positive bags and this many negative bags supply candidate centers.
	pub max_center_bags_per_label: usize,
	/// If true, a center taken from a positive bag must have more positives inside its threshold than outside, and a center from a negative bag the reverse.
	pub require_label_direction: bool,
}

impl Default for SplitModelOptions {
	fn default() -> Self {
		Self {
			max_center_bags_per_label: 8,
			require_label_direction: true,
		}
	}
}

/// A fitted split: points within `threshold` of the gaussian's mean, by mahalanobis distance, go to the yes branch.
#[derive(Clone, Debug)]
pub struct SplitModel {
	pub gaussian: Gaussian,
	pub threshold: f64,
	/// The log likelihood the threshold achieved on the point bags it was fit to.
	pub score: f64,
}

impl SplitModel {
	pub fn predicate(&self) -> DistanceThreshold {
		DistanceThreshold::new(
			Box::new(MahalanobisDistance::new(self.gaussian.clone())),
			self.threshold,
		)
	}
}

struct Candidate {
	distance: MahalanobisDistance,
	choice: ThresholdChoice,
}

/**
Fit a split to the point bags arriving at it.

Each valid point of the first few bags of each label is tried as the center, with a threshold chosen for the label of the bag it came from. When a center beats the best so far, the center is moved to the mean of the near points of the matching bags within its threshold and the threshold is chosen again, and the better of the two is kept. Points already within the best threshold are not tried.

Returns `Error::InsufficientData` if no bag has a point without NaN values. If there are valid points but none yields a threshold, the returned model has a zero center, a threshold of 0, and a score of negative infinity.
*/
pub fn fit_split(point_bags: &[PointBag], options: &SplitModelOptions) -> Result<SplitModel> {
	let dims = point_bags
		.iter()
		.find(|point_bag| point_bag.points().any(is_valid))
		.map(|point_bag| point_bag.point_size)
		.ok_or(Error::InsufficientData)?;
	let mut best: Option<Candidate> = None;
	let mut positives_left = options.max_center_bags_per_label;
	let mut negatives_left = options.max_center_bags_per_label;
	for point_bag in point_bags {
		if positives_left == 0 && negatives_left == 0 {
			break;
		}
		let left = if point_bag.label {
			&mut positives_left
		} else {
			&mut negatives_left
		};
		if *left == 0 {
			continue;
		}
		*left -= 1;
		for point in point_bag.points().filter(|point| is_valid(point)) {
			if let Some(best) = &best {
				if best.distance.distance(point) < best.choice.threshold {
					continue;
				}
			}
			let trial = MahalanobisDistance::new(Gaussian::new(Array1::from(point.to_vec())));
			let (distances, choice) = choose_threshold(
				point_bag.label,
				&trial,
				point_bags,
				None,
				options.require_label_direction,
			);
			let best_score = best
				.as_ref()
				.map(|best| best.choice.score)
				.unwrap_or(std::f64::NEG_INFINITY);
			if choice.score <= best_score {
				continue;
			}
			let candidate = Candidate {
				distance: trial,
				choice,
			};
			best = Some(refit(point_bag.label, candidate, &distances, point_bags, options));
		}
	}
	Ok(match best {
		Some(best) => SplitModel {
			gaussian: best.distance.gaussian,
			threshold: best.choice.threshold,
			score: best.choice.score,
		},
		None => SplitModel {
			gaussian: Gaussian::zeros(dims),
			threshold: 0.0,
			score: std::f64::NEG_INFINITY,
		},
	})
}

/// Move the center to the mean of the matching near points within the threshold, keeping the original if that scores worse.
fn refit(
	yes_label: bool,
	candidate: Candidate,
	distances: &[BagDistance],
	point_bags: &[PointBag],
	options: &SplitModelOptions,
) -> Candidate {
	let contained: Vec<ArrayView1<f64>> = candidate
		.choice
		.matching
		.iter()
		.filter_map(|index| {
			distances[*index]
				.near_point
				.map(|near_point| ArrayView1::from(point_bags[*index].point(near_point)))
		})
		.collect();
	let mean = match mean_of_points(&contained) {
		Some(mean) => mean,
		None => return candidate,
	};
	let fitted = MahalanobisDistance::new(Gaussian::new(mean));
	let (_, choice) = choose_threshold(
		yes_label,
		&fitted,
		point_bags,
		None,
		options.require_label_direction,
	);
	if choice.score < candidate.choice.score {
		log::debug!(
			"fitted center scored worse ({} < {})",
			choice.score,
			candidate.choice.score
		);
		return candidate;
	}
	Candidate {
		distance: fitted,
		choice,
	}
}

fn is_valid(point: &[f64]) -> bool {
	point.iter().all(|value| !value.is_nan())
}
