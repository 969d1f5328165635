use crate::{
	bag::{Bag, Binding, BindingBag, LeafBindingBag, LeafBindingBagGroup},
	entity_function::EntityFunction,
	error::{Error, Result},
	tree::{Node, NodeId, NodeIndex, RootNode, SplitBranch, SplitNode, Tree, VarNode},
};
use fnv::FnvHashMap;

/**
A `PointBag` holds the values an entity function produced for the bindings of one binding bag.

When the function reads fewer variables than the bindings hold, many bindings share the same arguments. Each distinct argument tuple is evaluated once, and `binding_points` maps every binding to the point computed for its arguments.
*/
#[derive(Clone, Debug)]
pub struct PointBag {
	pub bag_index: usize,
	pub label: bool,
	pub point_size: usize,
	values: Vec<f64>,
	/// For each binding, the index of its point.
	pub binding_points: Vec<usize>,
}

impl PointBag {
	pub fn point_count(&self) -> usize {
		if self.point_size == 0 {
			0
		} else {
			self.values.len() / self.point_size
		}
	}

	pub fn point(&self, index: usize) -> &[f64] {
		let start = index * self.point_size;
		&self.values[start..start + self.point_size]
	}

	pub fn points(&self) -> impl Iterator<Item = &[f64]> {
		(0..self.point_count()).map(move |index| self.point(index))
	}

	/// The point for the binding at `binding_index`.
	pub fn binding_point(&self, binding_index: usize) -> &[f64] {
		self.point(self.binding_points[binding_index])
	}
}

/// Evaluate `function` on the entities each binding in `binding_bag` assigns to `var_indices`.
pub fn point_bag<E>(
	function: &dyn EntityFunction<E>,
	var_indices: &[usize],
	binding_bag: &BindingBag<E>,
) -> PointBag {
	let point_size = function.out_count();
	let binding_count = binding_bag.binding_count();
	let key = |binding: &Binding| -> Vec<Option<usize>> {
		var_indices
			.iter()
			.map(|var_index| binding.get(*var_index).cloned().flatten())
			.collect()
	};
	let (sources, binding_points) =
		if binding_bag.entity_count > function.in_count() && binding_count > 0 {
			let mut order: Vec<usize> = (0..binding_count).collect();
			order.sort_by_cached_key(|index| key(binding_bag.binding(*index)));
			let mut sources: Vec<usize> = Vec::new();
			let mut binding_points = vec![0; binding_count];
			let mut previous: Option<Vec<Option<usize>>> = None;
			for index in order {
				let current = key(binding_bag.binding(index));
				if previous.as_ref() != Some(&current) {
					sources.push(index);
					previous = Some(current);
				}
				binding_points[index] = sources.len() - 1;
			}
			(sources, binding_points)
		} else {
			((0..binding_count).collect(), (0..binding_count).collect())
		};
	let mut values = vec![0.0; sources.len() * point_size];
	for (source, point) in sources.iter().zip(values.chunks_mut(point_size.max(1))) {
		let arguments = binding_bag.arguments(binding_bag.binding(*source), var_indices);
		function.get(&arguments, point);
	}
	PointBag {
		bag_index: binding_bag.bag_index,
		label: binding_bag.bag.label,
		point_size,
		values,
		binding_points,
	}
}

impl<E> Tree<E> {
	/**
	Send `binding_bag` down from `node`, returning the bindings that arrive at each leaf below it. Every leaf reached is listed, even if no binding arrived there.

	Bindings that reach a split without children cannot be placed, so that is an [`Error::IncompleteSplit`](../enum.Error.html#variant.IncompleteSplit).
	*/
	pub fn propagate<'a>(
		&self,
		node: NodeIndex,
		binding_bag: BindingBag<'a, E>,
	) -> Result<Vec<LeafBindingBag<'a, E>>> {
		let mut leaf_binding_bags = Vec::new();
		self.propagate_into(node, binding_bag, &mut leaf_binding_bags)?;
		Ok(leaf_binding_bags)
	}

	fn propagate_into<'a>(
		&self,
		node: NodeIndex,
		binding_bag: BindingBag<'a, E>,
		out: &mut Vec<LeafBindingBag<'a, E>>,
	) -> Result<()> {
		let entry = match self.entry(node) {
			Some(entry) => entry,
			None => return Ok(()),
		};
		match &entry.node {
			Node::Root(RootNode { kid }) => {
				if let Some(kid) = kid {
					self.propagate_into(*kid, binding_bag, out)?;
				}
			}
			Node::Var(VarNode { kid }) => {
				if let Some(kid) = kid {
					let extended = extend_bindings(binding_bag);
					self.propagate_into(*kid, extended, out)?;
				}
			}
			Node::Split(split) => self.propagate_split(entry.id, split, binding_bag, out)?,
			Node::Leaf(_) => out.push(LeafBindingBag {
				leaf: node,
				binding_bag,
			}),
		}
		Ok(())
	}

	fn propagate_split<'a>(
		&self,
		id: NodeId,
		split: &SplitNode<E>,
		binding_bag: BindingBag<'a, E>,
		out: &mut Vec<LeafBindingBag<'a, E>>,
	) -> Result<()> {
		let kids = match split.kids {
			Some(kids) => kids,
			None if binding_bag.is_empty() => return Ok(()),
			None => return Err(Error::IncompleteSplit(id)),
		};
		let mut branches = [
			BindingBag::empty(binding_bag.bag_index, binding_bag.bag, binding_bag.entity_count),
			BindingBag::empty(binding_bag.bag_index, binding_bag.bag, binding_bag.entity_count),
			BindingBag::empty(binding_bag.bag_index, binding_bag.bag, binding_bag.entity_count),
		];
		match (&split.function, &split.predicate) {
			(Some(function), Some(predicate)) if function.out_count() > 0 => {
				let point_bag = point_bag(function.as_ref(), &split.var_indices, &binding_bag);
				let point_branches: Vec<SplitBranch> = point_bag
					.points()
					.map(|point| {
						if point.iter().any(|value| value.is_nan()) {
							SplitBranch::Err
						} else if predicate.evaluate(point) {
							SplitBranch::Yes
						} else {
							SplitBranch::No
						}
					})
					.collect();
				for (binding, point_index) in binding_bag
					.bindings()
					.zip(point_bag.binding_points.iter())
				{
					branches[point_branches[*point_index].index()].push(binding);
				}
			}
			_ => branches[SplitBranch::Err.index()] = binding_bag,
		}
		let [yes, no, err] = branches;
		for (kid, branch) in kids.iter().zip(vec![yes, no, err]) {
			self.propagate_into(*kid, branch, out)?;
		}
		Ok(())
	}

	/// Propagate a whole bag from the root.
	pub fn propagate_bag<'a>(
		&self,
		bag_index: usize,
		bag: &'a Bag<E>,
	) -> Result<Vec<LeafBindingBag<'a, E>>> {
		self.propagate(self.root(), BindingBag::new(bag_index, bag))
	}

	/// Propagate every bag from the root and group the results by leaf. There is one group per leaf, in the order of `leaves`, and a group only holds the bags with at least one binding at its leaf.
	pub fn propagate_bags<'a>(
		&self,
		bags: &'a [Bag<E>],
	) -> Result<Vec<LeafBindingBagGroup<'a, E>>> {
		let leaves = self.leaves();
		let positions: FnvHashMap<NodeIndex, usize> = leaves
			.iter()
			.enumerate()
			.map(|(position, leaf)| (*leaf, position))
			.collect();
		let mut groups: Vec<LeafBindingBagGroup<E>> = leaves
			.into_iter()
			.map(|leaf| LeafBindingBagGroup {
				leaf,
				binding_bags: Vec::new(),
			})
			.collect();
		for (bag_index, bag) in bags.iter().enumerate() {
			for leaf_binding_bag in self.propagate_bag(bag_index, bag)? {
				if leaf_binding_bag.binding_bag.is_empty() {
					continue;
				}
				if let Some(position) = positions.get(&leaf_binding_bag.leaf) {
					groups[*position]
						.binding_bags
						.push(leaf_binding_bag.binding_bag);
				}
			}
		}
		Ok(groups)
	}

	/// The highest probability among the leaves the bag's bindings reach, or `None` if no binding reaches a leaf.
	pub fn predict(&self, bag: &Bag<E>) -> Result<Option<f64>> {
		let probability = self
			.propagate_bag(0, bag)?
			.iter()
			.filter(|leaf_binding_bag| !leaf_binding_bag.binding_bag.is_empty())
			.filter_map(|leaf_binding_bag| self.leaf(leaf_binding_bag.leaf))
			.map(|leaf| leaf.probability)
			.fold(None, |max: Option<f64>, probability| match max {
				Some(max) if max >= probability => Some(max),
				_ => Some(probability),
			});
		Ok(probability)
	}
}

/// Bind one more variable. Each binding is extended by every option at the next depth that it does not already use, or by `None` if there is no such option.
fn extend_bindings<E>(binding_bag: BindingBag<E>) -> BindingBag<E> {
	let depth = binding_bag.entity_count;
	let options = binding_bag.bag.options_at_depth(depth);
	let mut extended = BindingBag::empty(binding_bag.bag_index, binding_bag.bag, depth + 1);
	for binding in binding_bag.bindings() {
		let mut bound = false;
		for option in options.iter() {
			if !binding.contains(&Some(*option)) {
				extended.push_extended(binding, Some(*option));
				bound = true;
			}
		}
		if !bound {
			extended.push_extended(binding, None);
		}
	}
	extended
}
