use crate::tree::NodeId;
use thiserror::Error;

/// The errors the learner can produce. Bindings with unbound variables are not errors. They are routed to a split's `err` child.
#[derive(Debug, Error)]
pub enum Error {
	/// An entity function's arity or output type does not match what its caller requires, such as a difference of a non-float property.
	#[error("schema mismatch: {0}")]
	SchemaMismatch(String),
	/// No usable point arrived at a split being fit, so no model can be learned there.
	#[error("insufficient data to fit a split")]
	InsufficientData,
	/// The bags could not be partitioned into a nonempty validation set.
	#[error("no validation bags")]
	NoValidationBags,
	/// The class probabilities handed to a multinomial do not sum to one.
	#[error("multinomial probabilities sum to {sum} rather than 1")]
	InvalidMultinomial { sum: f64 },
	#[error("invalid binomial parameters")]
	InvalidBinomial,
	/// An expansion refers to a node id the tree does not have.
	#[error("no node with id {0}")]
	UnknownNode(NodeId),
	/// Bindings reached a split that has no children to send them to.
	#[error("split {0} has no children")]
	IncompleteSplit(NodeId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
