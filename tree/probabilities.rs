/*!
A bag may have bindings at many leaves. To estimate leaf probabilities without counting a bag twice, leaves are assigned probabilities greedily: the leaf whose bags give the highest smoothed probability of being positive takes its bags first, and the leaves after it only count the bags not yet taken. Probabilities are forced to decrease in the order leaves are chosen, so a bag's maximum probability is always the one from the first leaf that took it.
*/

use crate::{
	bag::{Bag, LeafBindingBagGroup, LeafCount},
	error::Result,
	tree::Tree,
};
use concuno_metrics::{LogLikelihood, LogLikelihoodInput, StreamingMetric};
use fnv::FnvHashSet;
use num_traits::ToPrimitive;
use std::cmp::Ordering;

/// A group's bags as `(bag_index, label)` pairs, in the group's order.
pub type BagGroup = Vec<(usize, bool)>;

pub fn bag_group<E>(group: &LeafBindingBagGroup<E>) -> BagGroup {
	group
		.binding_bags
		.iter()
		.map(|binding_bag| (binding_bag.bag_index, binding_bag.bag.label))
		.collect()
}

/**
Assign each group a probability with the greedy procedure above, smoothing with `prior` pseudo counts of each label. The returned counts are in the order of `groups`, count only the bags each group took, and have no leaf set.
*/
pub fn leaf_counts(groups: &[BagGroup], prior: f64) -> Vec<LeafCount> {
	let mut counts: Vec<LeafCount> = groups
		.iter()
		.map(|_| LeafCount {
			leaf: None,
			probability: 0.0,
			positive_count: 0,
			negative_count: 0,
		})
		.collect();
	let mut done = vec![false; groups.len()];
	let mut used: FnvHashSet<usize> = FnvHashSet::default();
	let mut previous = 1.0;
	for _ in 0..groups.len() {
		let mut best: Option<(usize, f64, u64, u64)> = None;
		for (index, group) in groups.iter().enumerate() {
			if done[index] {
				continue;
			}
			let (positive_count, negative_count) = unused_counts(group, &used);
			let total = (positive_count + negative_count).to_f64().unwrap_or(0.0);
			let mut probability = if total + 2.0 * prior > 0.0 {
				(positive_count.to_f64().unwrap_or(0.0) + prior) / (total + 2.0 * prior)
			} else {
				0.5
			};
			if probability >= previous {
				probability = (1.0 - 1e-6) * previous;
			}
			if best.map(|best| probability > best.1).unwrap_or(true) {
				best = Some((index, probability, positive_count, negative_count));
			}
		}
		let (index, probability, positive_count, negative_count) = match best {
			Some(best) => best,
			None => break,
		};
		counts[index] = LeafCount {
			leaf: None,
			probability,
			positive_count,
			negative_count,
		};
		done[index] = true;
		used.extend(groups[index].iter().map(|(bag_index, _)| *bag_index));
		previous = probability;
	}
	counts
}

fn unused_counts(group: &[(usize, bool)], used: &FnvHashSet<usize>) -> (u64, u64) {
	group
		.iter()
		.filter(|(bag_index, _)| !used.contains(bag_index))
		.fold((0, 0), |(positive, negative), (_, label)| {
			if *label {
				(positive + 1, negative)
			} else {
				(positive, negative + 1)
			}
		})
}

/// For each group, the positions within it of the bags it claims when every bag is claimed by the group with the highest probability that holds it. Ties go to the earlier group.
pub fn max_claims(groups: &[BagGroup], probabilities: &[f64]) -> Vec<Vec<usize>> {
	let mut order: Vec<usize> = (0..groups.len()).collect();
	order.sort_by(|a, b| {
		probabilities[*b]
			.partial_cmp(&probabilities[*a])
			.unwrap_or(Ordering::Equal)
	});
	let mut claimed: FnvHashSet<usize> = FnvHashSet::default();
	let mut claims = vec![Vec::new(); groups.len()];
	for index in order {
		for (position, (bag_index, _)) in groups[index].iter().enumerate() {
			if claimed.insert(*bag_index) {
				claims[index].push(position);
			}
		}
	}
	claims
}

/// Count the bags each group claims under `max_claims`, keeping each group's probability.
pub fn max_leaf_counts(groups: &[BagGroup], probabilities: &[f64]) -> Vec<LeafCount> {
	max_claims(groups, probabilities)
		.iter()
		.zip(groups.iter().zip(probabilities.iter()))
		.map(|(claims, (group, probability))| {
			let positive_count = claims.iter().filter(|position| group[**position].1).count();
			let negative_count = claims.len() - positive_count;
			LeafCount {
				leaf: None,
				probability: *probability,
				positive_count: positive_count.to_u64().unwrap_or(0),
				negative_count: negative_count.to_u64().unwrap_or(0),
			}
		})
		.collect()
}

/// Sum the log likelihood of every leaf's counts.
pub fn log_likelihood(counts: &[LeafCount]) -> f64 {
	let mut metric = LogLikelihood::new();
	for count in counts {
		metric.update(LogLikelihoodInput {
			positive_count: count.positive_count,
			negative_count: count.negative_count,
			probability: count.probability,
		});
	}
	metric.finalize()
}

impl<E> Tree<E> {
	/// Propagate `bags` and set every leaf's probability and strength from the bags that reach it. Returns the counts, with leaves set, in the order of `leaves`.
	pub fn update_leaf_probabilities(
		&mut self,
		bags: &[Bag<E>],
		prior: f64,
	) -> Result<Vec<LeafCount>> {
		let (leaves, groups): (Vec<_>, Vec<_>) = self
			.propagate_bags(bags)?
			.iter()
			.map(|group| (group.leaf, bag_group(group)))
			.unzip();
		let mut counts = leaf_counts(&groups, prior);
		for (count, leaf) in counts.iter_mut().zip(leaves.into_iter()) {
			count.leaf = Some(leaf);
			if let Some(node) = self.leaf_mut(leaf) {
				node.probability = count.probability;
				node.strength =
					(count.positive_count + count.negative_count).to_f64().unwrap_or(0.0) + 2.0 * prior;
			}
		}
		Ok(counts)
	}

	/// Count the bags each leaf claims when every bag goes to the leaf with the highest probability among those it reaches.
	pub fn max_leaf_counts(&self, bags: &[Bag<E>]) -> Result<Vec<LeafCount>> {
		let groups = self.propagate_bags(bags)?;
		let probabilities = self.group_probabilities(&groups);
		let bag_groups: Vec<BagGroup> = groups.iter().map(bag_group).collect();
		let counts = max_leaf_counts(&bag_groups, &probabilities)
			.into_iter()
			.zip(groups.iter())
			.map(|(count, group)| LeafCount {
				leaf: Some(group.leaf),
				..count
			})
			.collect();
		Ok(counts)
	}

	/// The log likelihood of the labels of `bags` under this tree, with each bag counted at the leaf that claims it.
	pub fn log_metric(&self, bags: &[Bag<E>]) -> Result<f64> {
		Ok(log_likelihood(&self.max_leaf_counts(bags)?))
	}

	pub(crate) fn group_probabilities(&self, groups: &[LeafBindingBagGroup<E>]) -> Vec<f64> {
		groups
			.iter()
			.map(|group| {
				self.leaf(group.leaf)
					.map(|leaf| leaf.probability)
					.unwrap_or(0.0)
			})
			.collect()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_leaf_counts_are_decreasing() {
		let groups = vec![
			vec![(0, true), (1, false), (2, true)],
			vec![(0, true), (3, true), (4, true)],
			vec![(5, false), (6, false)],
			vec![(1, false), (3, true)],
		];
		let counts = leaf_counts(&groups, 1.0);
		// The second group wins first with 3 positives, (3 + 1) / (3 + 2).
		assert!((counts[1].probability - 0.8).abs() < 1e-12);
		assert_eq!((counts[1].positive_count, counts[1].negative_count), (3, 0));
		// Then the first group with only bags 1 and 2 left, (1 + 1) / (2 + 2).
		assert!((counts[0].probability - 0.5).abs() < 1e-12);
		assert_eq!((counts[0].positive_count, counts[0].negative_count), (1, 1));
		// The last group has nothing left and would get 0.5, so it is pushed just below the previous.
		assert!((counts[3].probability - 0.5 * (1.0 - 1e-6)).abs() < 1e-12);
		assert_eq!((counts[3].positive_count, counts[3].negative_count), (0, 0));
		assert!((counts[2].probability - 0.25).abs() < 1e-12);
		let mut probabilities: Vec<f64> = counts.iter().map(|count| count.probability).collect();
		probabilities.sort_by(|a, b| b.partial_cmp(a).unwrap());
		assert!(probabilities.windows(2).all(|pair| pair[0] > pair[1]));
	}

	#[test]
	fn test_max_claims() {
		let groups = vec![
			vec![(0, true), (1, false)],
			vec![(1, false), (2, true)],
			vec![(2, true), (3, false)],
		];
		let probabilities = [0.2, 0.9, 0.2];
		let claims = max_claims(&groups, &probabilities);
		assert_eq!(claims, vec![vec![0], vec![0, 1], vec![1]]);
		let counts = max_leaf_counts(&groups, &probabilities);
		assert_eq!(
			counts
				.iter()
				.map(|count| (count.positive_count, count.negative_count))
				.collect::<Vec<_>>(),
			vec![(1, 0), (1, 1), (0, 1)]
		);
		let expected = 0.2f64.ln() + 0.9f64.ln() + 0.1f64.ln() + 0.8f64.ln();
		assert!((log_likelihood(&counts) - expected).abs() < 1e-12);
	}

	#[test]
	fn test_update_leaf_probabilities() {
		let mut tree = Tree::<u8>::with_leaf();
		let bags = vec![
			Bag::new(vec![1u8], true),
			Bag::new(vec![2u8], true),
			Bag::new(vec![3u8], false),
		];
		let counts = tree.update_leaf_probabilities(&bags, 1.0).unwrap();
		assert_eq!(counts.len(), 1);
		let leaf = tree.leaf(tree.leaves()[0]).unwrap();
		assert!((leaf.probability - 0.6).abs() < 1e-12);
		assert!((leaf.strength - 5.0).abs() < 1e-12);
		let expected = 2.0 * 0.6f64.ln() + 0.4f64.ln();
		assert!((tree.log_metric(&bags).unwrap() - expected).abs() < 1e-12);
	}

	#[test]
	fn test_leaf_counts_without_prior() {
		let groups = vec![vec![], vec![(0, true), (1, false)], vec![(2, true)]];
		let counts = leaf_counts(&groups, 0.0);
		assert!(counts.iter().all(|count| count.probability.is_finite()));
		// The pure group goes first, pushed just below 1.
		assert!((counts[2].probability - (1.0 - 1e-6)).abs() < 1e-12);
		// The empty group falls back to 0.5 and wins the tie with the mixed group by coming first.
		assert!((counts[0].probability - 0.5).abs() < 1e-12);
		assert_eq!((counts[0].positive_count, counts[0].negative_count), (0, 0));
		assert!((counts[1].probability - 0.5 * (1.0 - 1e-6)).abs() < 1e-12);
		assert_eq!((counts[1].positive_count, counts[1].negative_count), (1, 1));
	}
}
