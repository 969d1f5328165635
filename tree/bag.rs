/*!
This module defines the inputs to learning, the labeled [`Bag`](struct.Bag.html)s of entities, and the [`BindingBag`](struct.BindingBag.html)s that carry tuples of a bag's entities through a tree.
*/

use crate::tree::NodeIndex;
use std::sync::Arc;

/// A `Bag` is one labeled example. It holds a set of entities, any of which may be bound to the variables a tree introduces.
#[derive(Debug)]
pub struct Bag<E> {
	/// The entities in this bag. Bags built from the same source state may share one entity list.
	pub entities: Arc<[E]>,
	/// This is true if the bag is an instance of the concept being learned.
	pub label: bool,
	/// For each variable depth, the indexes into `entities` that a variable at that depth may bind. A missing or empty list leaves that depth unconstrained.
	pub participant_options: Vec<Vec<usize>>,
}

impl<E> Bag<E> {
	pub fn new(entities: impl Into<Arc<[E]>>, label: bool) -> Self {
		Self {
			entities: entities.into(),
			label,
			participant_options: Vec::new(),
		}
	}

	/// Constrain the variable at `depth` to bind `participant` among its options.
	pub fn push_participant(&mut self, depth: usize, participant: usize) {
		if self.participant_options.len() <= depth {
			self.participant_options.resize_with(depth + 1, Vec::new);
		}
		self.participant_options[depth].push(participant);
	}

	/// The entity indexes a variable at `depth` may bind, before removing entities the binding already uses.
	pub fn options_at_depth(&self, depth: usize) -> Vec<usize> {
		match self.participant_options.get(depth) {
			Some(options) if !options.is_empty() => options.clone(),
			_ => (0..self.entities.len()).collect(),
		}
	}
}

impl<E> Clone for Bag<E> {
	fn clone(&self) -> Self {
		Self {
			entities: self.entities.clone(),
			label: self.label,
			participant_options: self.participant_options.clone(),
		}
	}
}

/**
A `BindingBag` holds the bindings of one bag that arrive at some node. Every binding has `entity_count` slots, one per variable above the node. A slot holds the index of an entity in the bag, or `None` if the variable at that depth found no entity to bind.

The bindings are stored flattened in a single `Vec`, binding after binding.
*/
#[derive(Debug)]
pub struct BindingBag<'a, E> {
	/// The index of `bag` in the list of bags being propagated. It identifies the bag when counting bags across leaves.
	pub bag_index: usize,
	pub bag: &'a Bag<E>,
	pub entity_count: usize,
	binding_count: usize,
	entities: Vec<Option<usize>>,
}

/// A binding is a tuple of entity indexes into its bag, with `None` for variables that could not be bound.
pub type Binding = [Option<usize>];

impl<'a, E> BindingBag<'a, E> {
	/// Create a binding bag with a single empty binding, the starting point for propagation from the root.
	pub fn new(bag_index: usize, bag: &'a Bag<E>) -> Self {
		Self {
			bag_index,
			bag,
			entity_count: 0,
			binding_count: 1,
			entities: Vec::new(),
		}
	}

	/// Create a binding bag with no bindings yet, whose bindings will have `entity_count` slots.
	pub fn empty(bag_index: usize, bag: &'a Bag<E>, entity_count: usize) -> Self {
		Self {
			bag_index,
			bag,
			entity_count,
			binding_count: 0,
			entities: Vec::new(),
		}
	}

	pub fn binding_count(&self) -> usize {
		self.binding_count
	}

	pub fn is_empty(&self) -> bool {
		self.binding_count == 0
	}

	pub fn binding(&self, index: usize) -> &Binding {
		let start = index * self.entity_count;
		&self.entities[start..start + self.entity_count]
	}

	pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
		(0..self.binding_count).map(move |index| self.binding(index))
	}

	/// Append a binding. Its length must equal `entity_count`.
	pub fn push(&mut self, binding: &Binding) {
		debug_assert_eq!(binding.len(), self.entity_count);
		self.entities.extend_from_slice(binding);
		self.binding_count += 1;
	}

	/// Append `binding` extended by one more slot holding `entity`. This binding bag's `entity_count` must be one more than the length of `binding`.
	pub fn push_extended(&mut self, binding: &Binding, entity: Option<usize>) {
		debug_assert_eq!(binding.len() + 1, self.entity_count);
		self.entities.extend_from_slice(binding);
		self.entities.push(entity);
		self.binding_count += 1;
	}

	/// Look up the entities a binding refers to, in the order given by `var_indices`.
	pub fn arguments(&self, binding: &Binding, var_indices: &[usize]) -> Vec<Option<&'a E>> {
		let entities: &'a [E] = &self.bag.entities;
		var_indices
			.iter()
			.map(|var_index| {
				binding
					.get(*var_index)
					.cloned()
					.flatten()
					.map(|entity_index| &entities[entity_index])
			})
			.collect()
	}
}

impl<'a, E> Clone for BindingBag<'a, E> {
	fn clone(&self) -> Self {
		Self {
			bag_index: self.bag_index,
			bag: self.bag,
			entity_count: self.entity_count,
			binding_count: self.binding_count,
			entities: self.entities.clone(),
		}
	}
}

/// The bindings of one bag that arrived at one leaf.
#[derive(Debug)]
pub struct LeafBindingBag<'a, E> {
	pub leaf: NodeIndex,
	pub binding_bag: BindingBag<'a, E>,
}

/// The bindings of every bag that arrived at one leaf. Each bag appears at most once, and only if at least one of its bindings arrived.
#[derive(Debug)]
pub struct LeafBindingBagGroup<'a, E> {
	pub leaf: NodeIndex,
	pub binding_bags: Vec<BindingBag<'a, E>>,
}

/// The numbers of positive and negative bags attributed to one leaf when every bag counts toward exactly one leaf, along with that leaf's probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafCount {
	/// The leaf these counts belong to, or `None` for a synthetic leaf that exists only while scoring.
	pub leaf: Option<NodeIndex>,
	pub probability: f64,
	pub positive_count: u64,
	pub negative_count: u64,
}
