/*!
This module chooses the distance threshold for a split. Every bag is summarized by the distances from a center to its nearest and farthest points. A bag whose far distance is within the threshold lies entirely inside, a bag whose near distance is beyond it lies entirely outside, and any other bag straddles it. Straddling bags are credited to whichever side would have the higher probability of holding positive bags.
*/

use crate::{predicate::Function, propagate::PointBag};
use concuno_metrics::{LogLikelihood, LogLikelihoodInput, StreamingMetric};
use num_traits::ToPrimitive;
use std::cmp::Ordering;

/// The distances from a center to the nearest and farthest valid points of one bag. Both are infinite if the bag has no valid point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BagDistance {
	pub label: bool,
	pub near: f64,
	pub far: f64,
	/// The index of the nearest point in the bag's point list.
	pub near_point: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdChoice {
	pub threshold: f64,
	/// The log likelihood of the best threshold, or the starting score if no threshold beat it.
	pub score: f64,
	/// The indexes of the distances whose near point is within the threshold and whose label is the one the yes side is for.
	pub matching: Vec<usize>,
	/// The indexes of the distances whose near point is within the threshold and whose label is the other one.
	pub other: Vec<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Edge {
	Near,
	Far,
	/// The near and far distances are equal, so the bag moves from outside to inside at once.
	Both,
}

#[derive(Clone, Copy, Debug)]
struct Event {
	distance: usize,
	edge: Edge,
	position: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct SideCounts {
	yes: u64,
	both: u64,
	no: u64,
}

/// Measure the near and far distances of every point bag from the center of `distance`. NaN distances are ignored.
pub fn bag_distances(distance: &dyn Function, point_bags: &[PointBag]) -> Vec<BagDistance> {
	let mut value = [0.0];
	point_bags
		.iter()
		.map(|point_bag| {
			let mut bag_distance = BagDistance {
				label: point_bag.label,
				near: std::f64::INFINITY,
				far: -1.0,
				near_point: None,
			};
			for (index, point) in point_bag.points().enumerate() {
				distance.evaluate(point, &mut value);
				let current = value[0];
				if current > bag_distance.far {
					bag_distance.far = current;
				}
				if current < bag_distance.near {
					bag_distance.near = current;
					bag_distance.near_point = Some(index);
				}
			}
			if bag_distance.far < 0.0 {
				bag_distance.far = std::f64::INFINITY;
			}
			bag_distance
		})
		.collect()
}

/**
Choose the threshold on the distances that maximizes the log likelihood of the bag labels when the inside and the outside of the threshold each predict their own probability.

`yes_label` says which label the inside of the threshold is for. If `require_label_direction` is true, only thresholds where the inside has the higher probability of positives when `yes_label` is true, or the lower when it is false, are considered. Thresholds are placed halfway between consecutive distances. Bags with no finite near distance are left out. If no threshold beats `score`, the returned threshold is 0.
*/
pub fn choose_threshold_with_distances(
	yes_label: bool,
	distances: &[BagDistance],
	score: Option<f64>,
	require_label_direction: bool,
) -> ThresholdChoice {
	let mut events = Vec::with_capacity(2 * distances.len());
	let mut positives = SideCounts::default();
	let mut negatives = SideCounts::default();
	for (index, distance) in distances.iter().enumerate() {
		if !(distance.near < std::f64::INFINITY) {
			continue;
		}
		if distance.label {
			positives.no += 1;
		} else {
			negatives.no += 1;
		}
		if distance.near == distance.far {
			events.push(Event {
				distance: index,
				edge: Edge::Both,
				position: distance.far,
			});
		} else {
			events.push(Event {
				distance: index,
				edge: Edge::Near,
				position: distance.near,
			});
			events.push(Event {
				distance: index,
				edge: Edge::Far,
				position: distance.far,
			});
		}
	}
	events.sort_by(|a, b| {
		a.position
			.partial_cmp(&b.position)
			.unwrap_or(Ordering::Equal)
	});
	let mut best_score = score.unwrap_or(std::f64::NEG_INFINITY);
	let mut threshold = 0.0;
	for (position, event) in events.iter().enumerate() {
		let counts = if distances[event.distance].label {
			&mut positives
		} else {
			&mut negatives
		};
		match event.edge {
			Edge::Both => {
				counts.no -= 1;
				counts.yes += 1;
			}
			Edge::Far => {
				counts.both -= 1;
				counts.yes += 1;
			}
			Edge::Near => {
				counts.no -= 1;
				counts.both += 1;
			}
		}
		let next = events.get(position + 1).map(|next| next.position);
		if next == Some(event.position) {
			continue;
		}
		let mut positive_as_yes = positives.yes + positives.both;
		let mut negative_as_yes = negatives.yes + negatives.both;
		let mut positive_as_no = positives.no + positives.both;
		let mut negative_as_no = negatives.no + negatives.both;
		let mut yes_probability = ratio(positive_as_yes, negative_as_yes);
		let mut no_probability = ratio(positive_as_no, negative_as_no);
		if yes_probability > no_probability {
			if require_label_direction && !yes_label {
				continue;
			}
			positive_as_no -= positives.both;
			negative_as_no -= negatives.both;
			no_probability = ratio(positive_as_no, negative_as_no);
		} else {
			if require_label_direction && yes_label {
				continue;
			}
			positive_as_yes -= positives.both;
			negative_as_yes -= negatives.both;
			yes_probability = ratio(positive_as_yes, negative_as_yes);
		}
		let mut metric = LogLikelihood::new();
		metric.update(LogLikelihoodInput {
			positive_count: positive_as_yes,
			negative_count: negative_as_yes,
			probability: yes_probability,
		});
		metric.update(LogLikelihoodInput {
			positive_count: positive_as_no,
			negative_count: negative_as_no,
			probability: no_probability,
		});
		let current_score = metric.finalize();
		if current_score > best_score {
			threshold = match next {
				Some(next) => (event.position + next) / 2.0,
				None => event.position,
			};
			best_score = current_score;
		}
	}
	let mut matching = Vec::new();
	let mut other = Vec::new();
	for event in events.iter().filter(|event| event.edge != Edge::Far) {
		let distance = &distances[event.distance];
		if distance.near > threshold {
			break;
		}
		if distance.label == yes_label {
			matching.push(event.distance);
		} else {
			other.push(event.distance);
		}
	}
	ThresholdChoice {
		threshold,
		score: best_score,
		matching,
		other,
	}
}

/// Measure the bag distances from the center of `distance` and choose a threshold on them.
pub fn choose_threshold(
	yes_label: bool,
	distance: &dyn Function,
	point_bags: &[PointBag],
	score: Option<f64>,
	require_label_direction: bool,
) -> (Vec<BagDistance>, ThresholdChoice) {
	let distances = bag_distances(distance, point_bags);
	let choice =
		choose_threshold_with_distances(yes_label, &distances, score, require_label_direction);
	(distances, choice)
}

/// The fraction of positives, or 0 if there are no bags.
fn ratio(positive_count: u64, negative_count: u64) -> f64 {
	let total = positive_count + negative_count;
	if total == 0 {
		0.0
	} else {
		positive_count.to_f64().unwrap_or(0.0) / total.to_f64().unwrap_or(1.0)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use rand::{Rng, SeedableRng};
	use rand_xoshiro::Xoshiro256Plus;

	fn single(label: bool, distance: f64) -> BagDistance {
		BagDistance {
			label,
			near: distance,
			far: distance,
			near_point: Some(0),
		}
	}

	#[test]
	fn test_separable() {
		let distances = vec![
			single(true, 1.0),
			single(false, 6.0),
			single(true, 2.0),
			single(false, 5.0),
		];
		let choice = choose_threshold_with_distances(true, &distances, None, true);
		assert_eq!(choice.threshold, 3.5);
		assert_eq!(choice.score, 0.0);
		assert_eq!(choice.matching, vec![0, 2]);
		assert!(choice.other.is_empty());
		// Negatives inside are not allowed when the inside is for positives.
		let choice = choose_threshold_with_distances(false, &distances, None, true);
		assert_eq!(choice.score, std::f64::NEG_INFINITY);
		assert_eq!(choice.threshold, 0.0);
	}

	#[test]
	fn test_ignores_invalid_bags() {
		let distances = vec![
			single(true, 1.0),
			BagDistance {
				label: false,
				near: std::f64::INFINITY,
				far: std::f64::INFINITY,
				near_point: None,
			},
			single(false, 3.0),
		];
		let choice = choose_threshold_with_distances(true, &distances, None, true);
		assert_eq!(choice.threshold, 2.0);
		assert_eq!(choice.score, 0.0);
		assert_eq!(choice.matching, vec![0]);
	}

	#[test]
	fn test_incoming_score_must_be_beaten() {
		let distances = vec![single(true, 1.0), single(false, 2.0), single(true, 3.0)];
		let choice = choose_threshold_with_distances(true, &distances, Some(0.0), true);
		assert_eq!(choice.score, 0.0);
		assert_eq!(choice.threshold, 0.0);
		assert!(choice.matching.is_empty());
	}

	#[test]
	fn test_straddling_bags() {
		// The positive bag straddles 1.5, so at 1.5 it counts on the side with more positives.
		let distances = vec![
			BagDistance {
				label: true,
				near: 1.0,
				far: 4.0,
				near_point: Some(2),
			},
			single(false, 2.0),
			single(true, 0.5),
		];
		let choice = choose_threshold_with_distances(true, &distances, None, true);
		assert_eq!(choice.threshold, 1.5);
		assert_eq!(choice.score, 0.0);
		assert_eq!(choice.matching, vec![2, 0]);
	}

	/// Score a threshold by counting from scratch which bags are inside, outside, or straddling it.
	fn score_at(
		yes_label: bool,
		distances: &[BagDistance],
		threshold: f64,
		require_label_direction: bool,
	) -> Option<f64> {
		let (mut positives, mut negatives) = (SideCounts::default(), SideCounts::default());
		for distance in distances.iter().filter(|d| d.near < std::f64::INFINITY) {
			let counts = if distance.label {
				&mut positives
			} else {
				&mut negatives
			};
			if distance.far <= threshold {
				counts.yes += 1;
			} else if distance.near <= threshold {
				counts.both += 1;
			} else {
				counts.no += 1;
			}
		}
		let optimistic_yes = ratio(positives.yes + positives.both, negatives.yes + negatives.both);
		let optimistic_no = ratio(positives.no + positives.both, negatives.no + negatives.both);
		let yes_wins = optimistic_yes > optimistic_no;
		if require_label_direction && yes_wins != yes_label {
			return None;
		}
		let (yes, no) = if yes_wins {
			(
				(positives.yes + positives.both, negatives.yes + negatives.both),
				(positives.no, negatives.no),
			)
		} else {
			(
				(positives.yes, negatives.yes),
				(positives.no + positives.both, negatives.no + negatives.both),
			)
		};
		let mut metric = LogLikelihood::new();
		for (positive_count, negative_count) in [yes, no].iter() {
			metric.update(LogLikelihoodInput {
				positive_count: *positive_count,
				negative_count: *negative_count,
				probability: ratio(*positive_count, *negative_count),
			});
		}
		Some(metric.finalize())
	}

	#[test]
	fn test_no_threshold_beats_the_choice() {
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		for trial in 0..200 {
			let bag_count = rng.gen_range(1, 12);
			let distances: Vec<BagDistance> = (0..bag_count)
				.map(|_| {
					let near = (rng.gen_range(0.0, 10.0) as f64).round();
					let far = if rng.gen_bool(0.5) {
						near
					} else {
						near + (rng.gen_range(0.0, 5.0) as f64).round()
					};
					BagDistance {
						label: rng.gen_bool(0.5),
						near,
						far,
						near_point: Some(0),
					}
				})
				.collect();
			let yes_label = trial % 2 == 0;
			let require_label_direction = trial % 3 != 0;
			let choice =
				choose_threshold_with_distances(yes_label, &distances, None, require_label_direction);
			let mut candidates: Vec<f64> = distances
				.iter()
				.flat_map(|d| vec![d.near, d.far])
				.collect();
			candidates.sort_by(|a, b| a.partial_cmp(b).unwrap());
			candidates.dedup();
			let best = candidates
				.iter()
				.filter_map(|t| score_at(yes_label, &distances, *t, require_label_direction))
				.fold(std::f64::NEG_INFINITY, f64::max);
			assert!((choice.score - best).abs() < 1e-9 || choice.score == best);
			if choice.score > std::f64::NEG_INFINITY {
				let rescored =
					score_at(yes_label, &distances, choice.threshold, require_label_direction).unwrap();
				assert!((rescored - choice.score).abs() < 1e-9 || rescored == choice.score);
			}
		}
	}
}
