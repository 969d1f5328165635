/*!
This crate defines the [`StreamingMetric`](trait.StreamingMetric.html) trait and the concrete metrics the learner and the command line use: the [`LogLikelihood`](struct.LogLikelihood.html) of labeled bag counts under leaf probabilities, which scores trees and candidate splits, and the bag-level [`Accuracy`](struct.Accuracy.html) and [`auc_roc`](fn.auc_roc.html) used to report how well a learned tree classifies held out bags.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod accuracy;
mod auc_roc;
mod log_likelihood;
mod mean;

pub use self::accuracy::Accuracy;
pub use self::auc_roc::{auc_roc, compute_roc_curve, RocCurvePoint};
pub use self::log_likelihood::{LogLikelihood, LogLikelihoodInput};
pub use self::mean::Mean;

/**
A `StreamingMetric` accumulates its input one item at a time. Partial results computed over separate chunks can be combined with `merge()`, and `finalize()` consumes the metric to produce its value.

The lifetime `'a` lets an `Input` borrow from the caller.

# Examples

A metric that tracks the smallest input seen:

```
use concuno_metrics::StreamingMetric;

struct Min(f64);

impl StreamingMetric<'_> for Min {
	type Input = f64;
	type Output = f64;
	fn update(&mut self, input: Self::Input) {
		self.0 = self.0.min(input)
	}
	fn merge(&mut self, other: Self) { self.0 = self.0.min(other.0) }
	fn finalize(self) -> Self::Output { self.0 }
}
```
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}
