use crate::{
	bag::{Bag, LeafCount},
	entity_function::EntityFunction,
	error::{Error, Result},
	probabilities::{bag_group, leaf_counts, log_likelihood, max_claims, BagGroup},
	propagate::{point_bag, PointBag},
	split_model::{fit_split, SplitModelOptions},
	stats::permutations,
	tree::{NodeId, NodeIndex, Tree},
	verify::bootstrap_p_value,
	LearnOptions, LearnProgress,
};
use concuno_util::progress_counter::ProgressCounter;
use fnv::FnvHashSet;
use num_traits::ToPrimitive;
use rand::Rng;
use std::{fmt, sync::Arc};

/// An `Expansion` describes one way to grow a tree: below the leaf with `leaf_id`, bind `new_var_count` more variables, then split on `function` applied to the variables at `var_indices`.
pub struct Expansion<E> {
	pub function: Arc<dyn EntityFunction<E>>,
	pub leaf_id: NodeId,
	pub new_var_count: usize,
	pub var_indices: Vec<usize>,
}

impl<E> fmt::Debug for Expansion<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Expansion")
			.field("function", &self.function.name())
			.field("leaf_id", &self.leaf_id)
			.field("new_var_count", &self.new_var_count)
			.field("var_indices", &self.var_indices)
			.finish()
	}
}

/// A record of an expansion the learner accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptedExpansion {
	pub function: String,
	pub leaf_id: NodeId,
	pub new_var_count: usize,
	pub var_indices: Vec<usize>,
	pub p_value: f64,
}

#[derive(Debug)]
pub struct LearnOutput<E> {
	pub tree: Tree<E>,
	/// The accepted expansions, in the order they were accepted.
	pub history: Vec<AcceptedExpansion>,
}

/**
Learn a tree from `bags`.

The first `training_fraction` of the bags are used to fit splits and leaf probabilities, and the rest to decide whether each expansion is significant. Shuffle the bags beforehand if their order is not random. Starting from a root with a single leaf, the learner repeatedly picks the leaf that would gain the most from a perfect split, tries every expansion of it, and keeps the expansion with the lowest bootstrap p value if that is below `significance_threshold`. It stops when no expansion is significant.
*/
pub fn learn<E, R: Rng + ?Sized>(
	bags: &[Bag<E>],
	functions: &[Arc<dyn EntityFunction<E>>],
	options: &LearnOptions,
	rng: &mut R,
	update_progress: &mut dyn FnMut(LearnProgress),
) -> Result<LearnOutput<E>> {
	let (training, validation) = split_bags(bags, options.training_fraction);
	learn_from(
		Tree::with_leaf(),
		training,
		validation,
		functions,
		options,
		rng,
		update_progress,
	)
}

/// Partition the bags into training and validation sets, in order.
pub fn split_bags<E>(bags: &[Bag<E>], training_fraction: f64) -> (&[Bag<E>], &[Bag<E>]) {
	let training_count = (bags.len().to_f64().unwrap_or(0.0) * training_fraction)
		.floor()
		.to_usize()
		.unwrap_or(0)
		.min(bags.len());
	bags.split_at(training_count)
}

/// Grow `tree` with explicit training and validation sets.
pub fn learn_from<E, R: Rng + ?Sized>(
	mut tree: Tree<E>,
	training: &[Bag<E>],
	validation: &[Bag<E>],
	functions: &[Arc<dyn EntityFunction<E>>],
	options: &LearnOptions,
	rng: &mut R,
	update_progress: &mut dyn FnMut(LearnProgress),
) -> Result<LearnOutput<E>> {
	if validation.is_empty() {
		return Err(Error::NoValidationBags);
	}
	#[cfg(feature = "timing")]
	let timing = crate::timing::Timing::new();
	#[cfg(feature = "timing")]
	let start_total = std::time::Instant::now();

	log::info!(
		"learning from {} training bags and {} validation bags",
		training.len(),
		validation.len()
	);
	#[cfg(feature = "timing")]
	let start = std::time::Instant::now();
	tree.update_leaf_probabilities(training, options.probability_prior)?;
	#[cfg(feature = "timing")]
	timing.update_probabilities.inc(start.elapsed());

	let mut history = Vec::new();
	loop {
		if let Some(max_expansions) = options.max_expansions {
			if history.len() >= max_expansions {
				break;
			}
		}

		// Choose the leaf to expand.
		#[cfg(feature = "timing")]
		let start = std::time::Instant::now();
		let leaf = pick_best_leaf(&tree, training, options.probability_prior)?;
		#[cfg(feature = "timing")]
		timing.propagate.inc(start.elapsed());
		let leaf = match leaf {
			Some(leaf) => leaf,
			None => break,
		};
		let leaf_id = match tree.id(leaf) {
			Some(leaf_id) => leaf_id,
			None => break,
		};
		let expansions = expansions(&tree, leaf, functions);
		log::info!(
			"trying {} expansions of leaf {}",
			expansions.len(),
			leaf_id
		);
		let progress_counter = ProgressCounter::new(expansions.len().to_u64().unwrap_or(0));
		update_progress(LearnProgress::Expanding {
			leaf_id,
			expansion_count: progress_counter.clone(),
		});

		// Build and verify every candidate, keeping the one with the lowest p value.
		let mut best: Option<(Tree<E>, f64, &Expansion<E>)> = None;
		for expansion in expansions.iter() {
			progress_counter.inc(1);
			let candidate = match expand(
				&tree,
				expansion,
				training,
				options,
				#[cfg(feature = "timing")]
				&timing,
			) {
				Ok(candidate) => candidate,
				Err(Error::InsufficientData) => {
					log::debug!("discarding {:?}: insufficient data", expansion);
					continue;
				}
				Err(error) => {
					log::warn!("discarding {:?}: {}", expansion, error);
					continue;
				}
			};
			let verify_counter =
				ProgressCounter::new(options.bootstrap_trials.to_u64().unwrap_or(0));
			update_progress(LearnProgress::Verifying(verify_counter.clone()));
			#[cfg(feature = "timing")]
			let start = std::time::Instant::now();
			let p_value = bootstrap_p_value(
				&tree,
				&candidate,
				validation,
				options.bootstrap_trials,
				rng,
				&verify_counter,
			);
			#[cfg(feature = "timing")]
			timing.verify.inc(start.elapsed());
			let p_value = match p_value {
				Ok(p_value) => p_value,
				Err(error) => {
					log::warn!("discarding {:?}: {}", expansion, error);
					continue;
				}
			};
			log::debug!("{:?} has p value {}", expansion, p_value);
			let is_best = best
				.as_ref()
				.map(|(_, best_p_value, _)| p_value < *best_p_value)
				.unwrap_or(true);
			if is_best {
				best = Some((candidate, p_value, expansion));
			}
		}

		match best {
			Some((candidate, p_value, expansion)) if p_value < options.significance_threshold => {
				log::info!(
					"accepted {} on vars {:?} below leaf {} with p value {}",
					expansion.function.name(),
					expansion.var_indices,
					expansion.leaf_id,
					p_value
				);
				history.push(AcceptedExpansion {
					function: expansion.function.name().to_owned(),
					leaf_id: expansion.leaf_id,
					new_var_count: expansion.new_var_count,
					var_indices: expansion.var_indices.clone(),
					p_value,
				});
				tree = candidate;
			}
			Some((_, p_value, _)) => {
				log::info!(
					"stopping, the best p value {} is not below {}",
					p_value,
					options.significance_threshold
				);
				break;
			}
			None => {
				log::info!("stopping, no expansion could be built");
				break;
			}
		}
	}

	#[cfg(feature = "timing")]
	timing.total.inc(start_total.elapsed());
	#[cfg(feature = "timing")]
	log::info!("{:?}", timing);
	log::info!(
		"learned a tree with {} leaves from {} expansions",
		tree.leaves().len(),
		history.len()
	);
	Ok(LearnOutput { tree, history })
}

/**
Choose the leaf whose bags would score best under a perfect split. For each leaf, the bags it claims that are positive stay, and every other bag at that leaf moves to a new leaf of rejects. The leaf probabilities are then recomputed and scored. The tree itself is not changed.

Returns `None` if no bag reaches any leaf.
*/
pub fn pick_best_leaf<E>(
	tree: &Tree<E>,
	bags: &[Bag<E>],
	prior: f64,
) -> Result<Option<NodeIndex>> {
	let groups = tree.propagate_bags(bags)?;
	let probabilities = tree.group_probabilities(&groups);
	let bag_groups: Vec<BagGroup> = groups.iter().map(bag_group).collect();
	let claims = max_claims(&bag_groups, &probabilities);
	let mut best: Option<(NodeIndex, f64)> = None;
	for (index, group) in bag_groups.iter().enumerate() {
		if group.is_empty() {
			continue;
		}
		let claimed: FnvHashSet<usize> = claims[index].iter().cloned().collect();
		let mut kept = BagGroup::new();
		let mut rejected = BagGroup::new();
		for (position, (bag_index, label)) in group.iter().enumerate() {
			if *label && claimed.contains(&position) {
				kept.push((*bag_index, *label));
			} else {
				rejected.push((*bag_index, *label));
			}
		}
		let mut trial_groups = bag_groups.clone();
		trial_groups[index] = kept;
		trial_groups.push(rejected);
		let counts: Vec<LeafCount> = leaf_counts(&trial_groups, prior);
		let score = log_likelihood(&counts);
		log::debug!("leaf {:?} scores {} with a perfect split", tree.id(groups[index].leaf), score);
		if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
			best = Some((groups[index].leaf, score));
		}
	}
	Ok(best.map(|(leaf, _)| leaf))
}

/**
List the expansions of `leaf`. Functions are tried with every number of new variables from the fewest that lets the smallest function apply up to the largest arity. A function applies when it takes no more variables than are bound and at least as many as are new. Its variable indices must include every new variable and must be strictly increasing, which leaves out reorderings of the same variables.
*/
pub fn expansions<E>(
	tree: &Tree<E>,
	leaf: NodeIndex,
	functions: &[Arc<dyn EntityFunction<E>>],
) -> Vec<Expansion<E>> {
	let mut expansions = Vec::new();
	let leaf_id = match tree.id(leaf) {
		Some(leaf_id) => leaf_id,
		None => return expansions,
	};
	let min_arity = functions.iter().map(|function| function.in_count()).min();
	let max_arity = functions.iter().map(|function| function.in_count()).max();
	let (min_arity, max_arity) = match (min_arity, max_arity) {
		(Some(min_arity), Some(max_arity)) => (min_arity, max_arity),
		_ => return expansions,
	};
	let var_depth = tree.var_depth(leaf);
	let min_new_var_count = min_arity.saturating_sub(var_depth);
	for new_var_count in min_new_var_count..=max_arity {
		let depth = var_depth + new_var_count;
		for function in functions {
			let arity = function.in_count();
			if arity > depth || arity < new_var_count {
				continue;
			}
			for var_indices in permutations(depth, arity) {
				let has_new_vars =
					(depth - new_var_count..depth).all(|var| var_indices.contains(&var));
				let is_increasing = var_indices.windows(2).all(|pair| pair[0] < pair[1]);
				if !has_new_vars || !is_increasing {
					continue;
				}
				expansions.push(Expansion {
					function: function.clone(),
					leaf_id,
					new_var_count,
					var_indices,
				});
			}
		}
	}
	expansions
}

/// Build the tree that results from `expansion`, with its split fit to `bags` and its leaf probabilities updated. `tree` is not changed.
pub fn expanded_tree<E>(
	tree: &Tree<E>,
	expansion: &Expansion<E>,
	bags: &[Bag<E>],
	options: &LearnOptions,
) -> Result<Tree<E>> {
	expand(
		tree,
		expansion,
		bags,
		options,
		#[cfg(feature = "timing")]
		&crate::timing::Timing::new(),
	)
}

fn expand<E>(
	tree: &Tree<E>,
	expansion: &Expansion<E>,
	bags: &[Bag<E>],
	options: &LearnOptions,
	#[cfg(feature = "timing")] timing: &crate::timing::Timing,
) -> Result<Tree<E>> {
	let mut tree = tree.clone();
	let mut leaf = tree
		.find_by_id(expansion.leaf_id)
		.ok_or(Error::UnknownNode(expansion.leaf_id))?;
	for _ in 0..expansion.new_var_count {
		let var = tree.create_var(true);
		tree.replace_kid(leaf, var);
		leaf = tree.kids(var)[0];
	}

	// Collect the points arriving at the new split.
	#[cfg(feature = "timing")]
	let start = std::time::Instant::now();
	let point_bags: Vec<PointBag> = tree
		.propagate_bags(bags)?
		.iter()
		.find(|group| group.leaf == leaf)
		.map(|group| {
			group
				.binding_bags
				.iter()
				.map(|binding_bag| {
					point_bag(
						expansion.function.as_ref(),
						&expansion.var_indices,
						binding_bag,
					)
				})
				.collect()
		})
		.unwrap_or_default();
	#[cfg(feature = "timing")]
	timing.propagate.inc(start.elapsed());

	#[cfg(feature = "timing")]
	let start = std::time::Instant::now();
	let split_model_options = SplitModelOptions {
		max_center_bags_per_label: options.max_center_bags_per_label,
		require_label_direction: options.require_label_direction,
	};
	let model = fit_split(&point_bags, &split_model_options)?;
	#[cfg(feature = "timing")]
	timing.fit_split.inc(start.elapsed());

	let split = tree.create_split(true);
	tree.replace_kid(leaf, split);
	if let Some(node) = tree.split_mut(split) {
		node.function = Some(expansion.function.clone());
		node.var_indices = expansion.var_indices.clone();
		node.predicate = Some(Box::new(model.predicate()));
	}

	#[cfg(feature = "timing")]
	let start = std::time::Instant::now();
	tree.update_leaf_probabilities(bags, options.probability_prior)?;
	#[cfg(feature = "timing")]
	timing.update_probabilities.inc(start.elapsed());
	Ok(tree)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		entity_function::{Difference, Property, Valid},
		predicate::{DistanceThreshold, MahalanobisDistance},
		stats::Gaussian,
	};
	use concuno_metrics::auc_roc;
	use rand::SeedableRng;
	use rand_xoshiro::Xoshiro256Plus;

	type Point = [f64; 2];

	fn location() -> Arc<dyn EntityFunction<Point>> {
		Arc::new(
			Property::new("Location", 2, |entity: &Point, out| {
				out.copy_from_slice(entity)
			})
			.unwrap(),
		)
	}

	/// Positive bags hold one point near (1, 1). Every other point is kept away from it.
	fn planted_bags(count: usize, seed: u64) -> Vec<Bag<Point>> {
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		let target = [1.0, 1.0];
		let far_point = |rng: &mut Xoshiro256Plus| loop {
			let point = [rng.gen_range(-5.0, 5.0), rng.gen_range(-5.0, 5.0)];
			let dx: f64 = point[0] - target[0];
			let dy: f64 = point[1] - target[1];
			if (dx * dx + dy * dy).sqrt() > 2.0 {
				return point;
			}
		};
		(0..count)
			.map(|index| {
				let label = index % 2 == 0;
				let mut entities: Vec<Point> = (0..3).map(|_| far_point(&mut rng)).collect();
				if label {
					let near = [
						target[0] + rng.gen_range(-0.2, 0.2),
						target[1] + rng.gen_range(-0.2, 0.2),
					];
					entities.insert(rng.gen_range(0, 4), near);
				}
				Bag::new(entities, label)
			})
			.collect()
	}

	#[test]
	fn test_expansions_of_root_leaf() {
		let functions: Vec<Arc<dyn EntityFunction<Point>>> = vec![
			location(),
			Arc::new(Difference::new(location()).unwrap()),
			Arc::new(Valid::new(2)),
		];
		let tree = Tree::with_leaf();
		let leaf = tree.leaves()[0];
		let expansions = expansions(&tree, leaf, &functions);
		let summary: Vec<String> = expansions
			.iter()
			.map(|expansion| {
				format!(
					"{} +{} {:?}",
					expansion.function.name(),
					expansion.new_var_count,
					expansion.var_indices
				)
			})
			.collect();
		insta::assert_debug_snapshot!(summary, @r###"
  [
      "Location +1 [0]",
      "DifferenceLocation +2 [0, 1]",
      "Valid +2 [0, 1]",
  ]
  "###);
	}

	#[test]
	fn test_expansions_below_vars() {
		let functions: Vec<Arc<dyn EntityFunction<Point>>> =
			vec![location(), Arc::new(Difference::new(location()).unwrap())];
		let mut tree = Tree::with_leaf();
		let leaf = tree.leaves()[0];
		let var = tree.create_var(true);
		tree.replace_kid(leaf, var);
		let leaf = tree.kids(var)[0];
		let summary: Vec<String> = expansions(&tree, leaf, &functions)
			.iter()
			.map(|expansion| {
				format!(
					"{} +{} {:?}",
					expansion.function.name(),
					expansion.new_var_count,
					expansion.var_indices
				)
			})
			.collect();
		insta::assert_debug_snapshot!(summary, @r###"
  [
      "Location +0 [0]",
      "Location +1 [1]",
      "DifferenceLocation +1 [0, 1]",
      "DifferenceLocation +2 [1, 2]",
  ]
  "###);
	}

	#[test]
	fn test_expanded_tree_leaves_source_unchanged() {
		let bags = planted_bags(30, 1);
		let mut tree = Tree::with_leaf();
		tree.update_leaf_probabilities(&bags, 1.0).unwrap();
		let before = tree.to_json();
		let leaf = tree.leaves()[0];
		let functions = vec![location()];
		let expansion = expansions(&tree, leaf, &functions).remove(0);
		let candidate = expanded_tree(&tree, &expansion, &bags, &LearnOptions::default()).unwrap();
		assert_eq!(tree.to_json(), before);
		assert_eq!(candidate.leaves().len(), 3);
		assert!(candidate.log_metric(&bags).unwrap() > tree.log_metric(&bags).unwrap());
		let yes = candidate.leaf(candidate.leaves()[0]).unwrap();
		assert!(yes.probability > 0.8);
	}

	#[test]
	fn test_pick_best_leaf() {
		let bags = planted_bags(30, 2);
		let mut tree = Tree::with_leaf();
		tree.update_leaf_probabilities(&bags, 1.0).unwrap();
		let leaf = tree.leaves()[0];
		assert_eq!(pick_best_leaf(&tree, &bags, 1.0).unwrap(), Some(leaf));
		assert_eq!(pick_best_leaf(&tree, &[], 1.0).unwrap(), None);
	}

	#[test]
	fn test_learn_planted_concept() {
		let bags = planted_bags(90, 3);
		let functions = vec![location()];
		let options = LearnOptions {
			bootstrap_trials: 1000,
			max_expansions: Some(3),
			..Default::default()
		};
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let mut progress_events = 0;
		let output = learn(&bags, &functions, &options, &mut rng, &mut |_| progress_events += 1).unwrap();
		assert!(!output.history.is_empty());
		assert_eq!(output.history[0].function, "Location");
		assert!(output.history[0].p_value < 0.1);
		assert!(progress_events > 0);
		let (_, validation) = split_bags(&bags, options.training_fraction);
		let probabilities: Vec<f64> = validation
			.iter()
			.map(|bag| output.tree.predict(bag).unwrap().unwrap_or(0.0))
			.collect();
		let labels: Vec<bool> = validation.iter().map(|bag| bag.label).collect();
		assert!(auc_roc(&probabilities, &labels).unwrap() > 0.9);
	}

	#[test]
	fn test_learn_requires_validation_bags() {
		let bags = planted_bags(1, 4);
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let options = LearnOptions {
			training_fraction: 1.0,
			..Default::default()
		};
		assert!(matches!(
			learn(&bags, &[location()], &options, &mut rng, &mut |_| {}),
			Err(Error::NoValidationBags)
		));
	}

	#[test]
	fn test_failed_candidates_are_discarded() {
		// Bindings near (100, 100) go to a split with no children.
		let mut tree = Tree::with_leaf();
		let leaf = tree.leaves()[0];
		let var = tree.create_var(true);
		tree.replace_kid(leaf, var);
		let leaf = tree.kids(var)[0];
		let split = tree.create_split(true);
		tree.replace_kid(leaf, split);
		let node = tree.split_mut(split).unwrap();
		node.function = Some(location());
		node.var_indices = vec![0];
		node.predicate = Some(Box::new(DistanceThreshold::new(
			Box::new(MahalanobisDistance::new(Gaussian::new(ndarray::arr1(&[
				100.0, 100.0,
			])))),
			1.0,
		)));
		let childless = tree.create_split(false);
		assert!(tree.put_kid(split, 0, childless));
		let training = planted_bags(30, 5);
		let mut validation = planted_bags(10, 6);
		validation[0] = Bag::new(vec![[100.0, 100.0]], true);
		assert!(matches!(
			tree.log_metric(&validation),
			Err(Error::IncompleteSplit(_))
		));
		let options = LearnOptions {
			bootstrap_trials: 10,
			..Default::default()
		};
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let output = learn_from(
			tree,
			&training,
			&validation,
			&[location()],
			&options,
			&mut rng,
			&mut |_| {},
		)
		.unwrap();
		assert!(output.history.is_empty());
	}
}
