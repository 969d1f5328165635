/*!
This crate learns relational decision trees for multi-instance binary classification. Each example is a [`Bag`](struct.Bag.html) of entities with a label. A tree binds variables to the entities of a bag, splits the resulting bindings on learned distance thresholds over entity functions, and estimates at each leaf the probability that a binding reaching it belongs to the concept.

Learning grows a tree one expansion at a time and keeps an expansion only if a bootstrap test on held out bags finds it significantly better than the tree before it.

```
use concuno_tree::{learn, Bag, EntityFunction, LearnOptions, Property};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::sync::Arc;

let bags: Vec<Bag<f64>> = (0..30)
	.map(|index| {
		let label = index % 2 == 0;
		let values = if label { vec![0.0, 8.0] } else { vec![4.0, 8.0] };
		Bag::new(values, label)
	})
	.collect();
let value = Property::new("Value", 1, |value: &f64, out: &mut [f64]| out[0] = *value).unwrap();
let functions: Vec<Arc<dyn EntityFunction<f64>>> = vec![Arc::new(value)];
let options = LearnOptions {
	bootstrap_trials: 100,
	..Default::default()
};
let mut rng = Xoshiro256Plus::seed_from_u64(0);
let output = learn(&bags, &functions, &options, &mut rng, &mut |_| {}).unwrap();
assert!(!output.history.is_empty());
```
*/

#![allow(clippy::tabs_in_doc_comments)]

mod bag;
mod entity_function;
mod error;
mod learn;
mod predicate;
mod probabilities;
mod propagate;
mod split_model;
mod stats;
mod threshold;
#[cfg(feature = "timing")]
mod timing;
mod tree;
mod verify;

pub use self::bag::{Bag, Binding, BindingBag, LeafBindingBag, LeafBindingBagGroup, LeafCount};
pub use self::entity_function::{
	reframe, Difference, Distance, EntityFunction, Property, Reframe, Valid, ValueType,
};
pub use self::error::{Error, Result};
pub use self::learn::{
	expanded_tree, expansions, learn, learn_from, pick_best_leaf, split_bags, AcceptedExpansion,
	Expansion, LearnOutput,
};
pub use self::predicate::{DistanceThreshold, Function, MahalanobisDistance, Predicate};
pub use self::probabilities::{leaf_counts, log_likelihood, max_claims, max_leaf_counts, BagGroup};
pub use self::propagate::{point_bag, PointBag};
pub use self::split_model::{fit_split, SplitModel, SplitModelOptions};
pub use self::stats::{mean_of_points, permutations, Gaussian, Multinomial};
pub use self::threshold::{
	bag_distances, choose_threshold, choose_threshold_with_distances, BagDistance, ThresholdChoice,
};
pub use self::tree::{
	LeafNode, Node, NodeEntry, NodeId, NodeIndex, RootNode, SplitBranch, SplitNode, Tree, VarNode,
};
pub use self::verify::bootstrap_p_value;

use concuno_util::progress_counter::ProgressCounter;

/// These are the options passed to [`learn`](fn.learn.html).
#[derive(Clone, Debug)]
pub struct LearnOptions {
	/// An expansion is accepted only if its bootstrap p value is below this value.
	pub significance_threshold: f64,
	/// The number of resampling trials in each bootstrap test.
	pub bootstrap_trials: usize,
	/// Leaf probabilities are smoothed as if every leaf had seen this many extra positive bags and this many extra negative bags.
	pub probability_prior: f64,
	/// When fitting a split, only the first this many positive bags and this many negative bags supply candidate centers.
	pub max_center_bags_per_label: usize,
	/// This is the fraction of the bags, taken from the front, used for training. The rest are used to verify expansions.
	pub training_fraction: f64,
	/// If this is `Some`, learning stops after this many expansions have been accepted.
	pub max_expansions: Option<usize>,
	/// If true, a split's center taken from a positive bag must put the higher probability inside its threshold, and a center from a negative bag must put it outside.
	pub require_label_direction: bool,
}

impl Default for LearnOptions {
	fn default() -> Self {
		Self {
			significance_threshold: 0.1,
			bootstrap_trials: 10_000,
			probability_prior: 1.0,
			max_center_bags_per_label: 8,
			training_fraction: 2.0 / 3.0,
			max_expansions: None,
			require_label_direction: true,
		}
	}
}

/// This enum reports the learning progress.
#[derive(Debug)]
pub enum LearnProgress {
	/// The learner is building and testing every expansion of one leaf.
	Expanding {
		leaf_id: NodeId,
		expansion_count: ProgressCounter,
	},
	/// The learner is running the bootstrap test on one candidate.
	Verifying(ProgressCounter),
}
