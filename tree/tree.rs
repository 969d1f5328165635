/*!
This module defines the [`Tree`](struct.Tree.html), an arena of nodes addressed by generation-stamped [`NodeIndex`](struct.NodeIndex.html)es. Every node also carries a [`NodeId`](struct.NodeId.html) assigned by the tree from a counter that only increases. Ids survive cloning the tree, so a node found in one tree can be found again in a copy with [`Tree::find_by_id`](struct.Tree.html#method.find_by_id).

A tree is a root with a single child, followed by any nesting of var nodes, split nodes, and leaves. A var node binds one more entity. A split node evaluates an entity function on some of the bound entities and sends each binding to its `yes`, `no`, or `err` child.
*/

use crate::{entity_function::EntityFunction, predicate::Predicate};
use fnv::FnvHashMap;
use serde_json::json;
use std::{fmt, sync::Arc};

/// A `NodeId` is unique within a tree and preserved by cloning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A `NodeIndex` addresses a slot in the tree's arena. The generation detects use of an index whose node has since been removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeIndex {
	index: u32,
	generation: u32,
}

/// A node is a root, var, split, or leaf.
#[derive(Debug)]
pub enum Node<E> {
	Root(RootNode),
	Var(VarNode),
	Split(SplitNode<E>),
	Leaf(LeafNode),
}

#[derive(Clone, Debug, Default)]
pub struct RootNode {
	pub kid: Option<NodeIndex>,
}

#[derive(Clone, Debug, Default)]
pub struct VarNode {
	pub kid: Option<NodeIndex>,
}

/// The children of a split node, in the order yes, no, err.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitBranch {
	Yes,
	No,
	Err,
}

impl SplitBranch {
	pub const ALL: [SplitBranch; 3] = [SplitBranch::Yes, SplitBranch::No, SplitBranch::Err];

	pub fn index(self) -> usize {
		match self {
			SplitBranch::Yes => 0,
			SplitBranch::No => 1,
			SplitBranch::Err => 2,
		}
	}
}

/// A `SplitNode` has either all three of its children or none of them.
pub struct SplitNode<E> {
	/// The yes, no, and err children.
	pub kids: Option<[NodeIndex; 3]>,
	pub function: Option<Arc<dyn EntityFunction<E>>>,
	/// For each argument to `function`, the index of the variable whose entity is passed.
	pub var_indices: Vec<usize>,
	pub predicate: Option<Box<dyn Predicate>>,
}

impl<E> fmt::Debug for SplitNode<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SplitNode")
			.field("kids", &self.kids)
			.field("function", &self.function.as_ref().map(|function| function.name()))
			.field("var_indices", &self.var_indices)
			.field("predicate", &self.predicate)
			.finish()
	}
}

impl<E> Clone for SplitNode<E> {
	fn clone(&self) -> Self {
		Self {
			kids: self.kids,
			function: self.function.clone(),
			var_indices: self.var_indices.clone(),
			predicate: self.predicate.clone(),
		}
	}
}

/// A `LeafNode` holds the probability that a binding reaching it belongs to the positive concept, and the strength of evidence behind that probability.
#[derive(Clone, Debug)]
pub struct LeafNode {
	pub probability: f64,
	pub strength: f64,
}

impl Default for LeafNode {
	fn default() -> Self {
		Self {
			probability: 0.5,
			strength: 0.0,
		}
	}
}

impl<E> Clone for Node<E> {
	fn clone(&self) -> Self {
		match self {
			Node::Root(node) => Node::Root(node.clone()),
			Node::Var(node) => Node::Var(node.clone()),
			Node::Split(node) => Node::Split(node.clone()),
			Node::Leaf(node) => Node::Leaf(node.clone()),
		}
	}
}

#[derive(Debug)]
pub struct NodeEntry<E> {
	pub id: NodeId,
	pub parent: Option<NodeIndex>,
	pub node: Node<E>,
}

impl<E> Clone for NodeEntry<E> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			parent: self.parent,
			node: self.node.clone(),
		}
	}
}

#[derive(Debug)]
struct Slot<E> {
	generation: u32,
	entry: Option<NodeEntry<E>>,
}

impl<E> Clone for Slot<E> {
	fn clone(&self) -> Self {
		Self {
			generation: self.generation,
			entry: self.entry.clone(),
		}
	}
}

/// Cloning a `Tree` makes a full structural copy that shares no mutable state with the original. Node ids and indexes are the same in the copy.
#[derive(Debug)]
pub struct Tree<E> {
	slots: Vec<Slot<E>>,
	free_slots: Vec<u32>,
	root: NodeIndex,
	next_id: u64,
	ids: FnvHashMap<NodeId, NodeIndex>,
}

impl<E> Clone for Tree<E> {
	fn clone(&self) -> Self {
		Self {
			slots: self.slots.clone(),
			free_slots: self.free_slots.clone(),
			root: self.root,
			next_id: self.next_id,
			ids: self.ids.clone(),
		}
	}
}

impl<E> Default for Tree<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E> Tree<E> {
	/// Create a tree holding only a root with no child. The root has id 0.
	pub fn new() -> Self {
		let mut tree = Self {
			slots: Vec::new(),
			free_slots: Vec::new(),
			root: NodeIndex {
				index: 0,
				generation: 0,
			},
			next_id: 0,
			ids: FnvHashMap::default(),
		};
		tree.root = tree.create(Node::Root(RootNode::default()));
		tree
	}

	/// Create a tree with a root and a single leaf, the starting point for learning.
	pub fn with_leaf() -> Self {
		let mut tree = Self::new();
		let leaf = tree.create_leaf();
		tree.put_kid(tree.root, 0, leaf);
		tree
	}

	pub fn root(&self) -> NodeIndex {
		self.root
	}

	pub fn entry(&self, index: NodeIndex) -> Option<&NodeEntry<E>> {
		self.slots
			.get(index.index as usize)
			.filter(|slot| slot.generation == index.generation)
			.and_then(|slot| slot.entry.as_ref())
	}

	fn entry_mut(&mut self, index: NodeIndex) -> Option<&mut NodeEntry<E>> {
		self.slots
			.get_mut(index.index as usize)
			.filter(|slot| slot.generation == index.generation)
			.and_then(|slot| slot.entry.as_mut())
	}

	pub fn node(&self, index: NodeIndex) -> Option<&Node<E>> {
		self.entry(index).map(|entry| &entry.node)
	}

	pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut Node<E>> {
		self.entry_mut(index).map(|entry| &mut entry.node)
	}

	pub fn id(&self, index: NodeIndex) -> Option<NodeId> {
		self.entry(index).map(|entry| entry.id)
	}

	pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
		self.entry(index).and_then(|entry| entry.parent)
	}

	pub fn find_by_id(&self, id: NodeId) -> Option<NodeIndex> {
		self.ids.get(&id).cloned()
	}

	pub fn leaf(&self, index: NodeIndex) -> Option<&LeafNode> {
		match self.node(index) {
			Some(Node::Leaf(leaf)) => Some(leaf),
			_ => None,
		}
	}

	pub fn leaf_mut(&mut self, index: NodeIndex) -> Option<&mut LeafNode> {
		match self.node_mut(index) {
			Some(Node::Leaf(leaf)) => Some(leaf),
			_ => None,
		}
	}

	pub fn split(&self, index: NodeIndex) -> Option<&SplitNode<E>> {
		match self.node(index) {
			Some(Node::Split(split)) => Some(split),
			_ => None,
		}
	}

	pub fn split_mut(&mut self, index: NodeIndex) -> Option<&mut SplitNode<E>> {
		match self.node_mut(index) {
			Some(Node::Split(split)) => Some(split),
			_ => None,
		}
	}

	/// The children of a node, in order. Splits list yes, no, then err.
	pub fn kids(&self, index: NodeIndex) -> &[NodeIndex] {
		match self.node(index) {
			Some(Node::Root(RootNode { kid: Some(kid) }))
			| Some(Node::Var(VarNode { kid: Some(kid) })) => std::slice::from_ref(kid),
			Some(Node::Split(SplitNode {
				kids: Some(kids), ..
			})) => kids,
			_ => &[],
		}
	}

	/// The number of nodes attached to the tree or waiting to be attached.
	pub fn node_count(&self) -> usize {
		self.ids.len()
	}

	fn create(&mut self, node: Node<E>) -> NodeIndex {
		let id = NodeId(self.next_id);
		self.next_id += 1;
		let entry = NodeEntry {
			id,
			parent: None,
			node,
		};
		let index = if let Some(index) = self.free_slots.pop() {
			let slot = &mut self.slots[index as usize];
			slot.entry = Some(entry);
			NodeIndex {
				index,
				generation: slot.generation,
			}
		} else {
			let index = self.slots.len() as u32;
			self.slots.push(Slot {
				generation: 0,
				entry: Some(entry),
			});
			NodeIndex {
				index,
				generation: 0,
			}
		};
		self.ids.insert(id, index);
		index
	}

	/// Create a detached leaf. Attach it with `put_kid` or `replace_kid`.
	pub fn create_leaf(&mut self) -> NodeIndex {
		self.create(Node::Leaf(LeafNode::default()))
	}

	/// Create a detached var node, optionally with a leaf child.
	pub fn create_var(&mut self, add_leaf: bool) -> NodeIndex {
		let var = self.create(Node::Var(VarNode::default()));
		if add_leaf {
			let leaf = self.create_leaf();
			self.put_kid(var, 0, leaf);
		}
		var
	}

	/// Create a detached split node, optionally with three leaf children.
	pub fn create_split(&mut self, add_leaves: bool) -> NodeIndex {
		let kids = if add_leaves {
			Some([self.create_leaf(), self.create_leaf(), self.create_leaf()])
		} else {
			None
		};
		let split = self.create(Node::Split(SplitNode {
			kids,
			function: None,
			var_indices: Vec::new(),
			predicate: None,
		}));
		if let Some(kids) = kids {
			for kid in kids.iter() {
				if let Some(entry) = self.entry_mut(*kid) {
					entry.parent = Some(split);
				}
			}
		}
		split
	}

	/**
	Make `kid` the child of `parent` at `position`, removing the subtree previously there. Roots and vars have a single position 0. A split's positions are its yes, no, and err branches, and a split without children only accepts leaves here if it already has its three children.

	Returns false if the position does not exist.
	*/
	pub fn put_kid(&mut self, parent: NodeIndex, position: usize, kid: NodeIndex) -> bool {
		let old = match self.node_mut(parent) {
			Some(Node::Root(RootNode { kid: slot })) | Some(Node::Var(VarNode { kid: slot }))
				if position == 0 =>
			{
				std::mem::replace(slot, Some(kid))
			}
			Some(Node::Split(SplitNode {
				kids: Some(kids), ..
			})) if position < 3 => Some(std::mem::replace(&mut kids[position], kid)),
			_ => return false,
		};
		if let Some(old) = old.filter(|old| *old != kid) {
			self.remove_subtree(old);
		}
		if let Some(entry) = self.entry_mut(kid) {
			entry.parent = Some(parent);
		}
		true
	}

	/// Put `new_kid` where `old_kid` is in its parent, removing `old_kid` and its subtree.
	pub fn replace_kid(&mut self, old_kid: NodeIndex, new_kid: NodeIndex) -> bool {
		let parent = match self.parent(old_kid) {
			Some(parent) => parent,
			None => return false,
		};
		let position = match self.kids(parent).iter().position(|kid| *kid == old_kid) {
			Some(position) => position,
			None => return false,
		};
		self.put_kid(parent, position, new_kid)
	}

	/// Remove a node and all its descendants from the arena.
	pub fn remove_subtree(&mut self, index: NodeIndex) {
		let kids = self.kids(index).to_vec();
		for kid in kids {
			self.remove_subtree(kid);
		}
		if let Some(slot) = self.slots.get_mut(index.index as usize) {
			if slot.generation != index.generation {
				return;
			}
			if let Some(entry) = slot.entry.take() {
				self.ids.remove(&entry.id);
				slot.generation = slot.generation.wrapping_add(1);
				self.free_slots.push(index.index);
			}
		}
	}

	/// Count the var nodes above `index`, including `index` itself if it is a var node.
	pub fn var_depth(&self, index: NodeIndex) -> usize {
		let mut depth = 0;
		let mut current = Some(index);
		while let Some(index) = current {
			if let Some(Node::Var(_)) = self.node(index) {
				depth += 1;
			}
			current = self.parent(index);
		}
		depth
	}

	/// List the leaves in depth first order, visiting children in order.
	pub fn leaves(&self) -> Vec<NodeIndex> {
		let mut leaves = Vec::new();
		let mut stack = vec![self.root];
		while let Some(index) = stack.pop() {
			if let Some(Node::Leaf(_)) = self.node(index) {
				leaves.push(index);
			}
			stack.extend(self.kids(index).iter().rev());
		}
		leaves
	}

	pub fn leaf_node_ids(&self) -> Vec<NodeId> {
		self.leaves()
			.into_iter()
			.filter_map(|leaf| self.id(leaf))
			.collect()
	}

	/// Export the tree as json, one object per node with its children under `"kids"`.
	pub fn to_json(&self) -> serde_json::Value {
		self.node_to_json(self.root)
	}

	fn node_to_json(&self, index: NodeIndex) -> serde_json::Value {
		let kids: Vec<serde_json::Value> = self
			.kids(index)
			.iter()
			.map(|kid| self.node_to_json(*kid))
			.collect();
		match self.node(index) {
			Some(Node::Root(_)) => json!({ "type": "Root", "kids": kids }),
			Some(Node::Var(_)) => json!({ "type": "Var", "kids": kids }),
			Some(Node::Split(split)) => json!({
				"type": "Split",
				"function": split.function.as_ref().map(|function| function.name().to_owned()),
				"vars": split.var_indices,
				"predicate": split.predicate.as_ref().map(|predicate| predicate.to_json()),
				"kids": kids,
			}),
			Some(Node::Leaf(leaf)) => json!({
				"type": "Leaf",
				"probability": leaf.probability,
				"strength": leaf.strength,
				"kids": kids,
			}),
			None => serde_json::Value::Null,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_with_leaf() {
		let tree = Tree::<()>::with_leaf();
		let leaves = tree.leaves();
		assert_eq!(leaves.len(), 1);
		assert_eq!(tree.id(tree.root()), Some(NodeId(0)));
		assert_eq!(tree.id(leaves[0]), Some(NodeId(1)));
		assert_eq!(tree.parent(leaves[0]), Some(tree.root()));
		assert_eq!(tree.var_depth(leaves[0]), 0);
	}

	#[test]
	fn test_replace_leaf_with_vars_and_split() {
		let mut tree = Tree::<()>::with_leaf();
		let leaf = tree.leaves()[0];
		let var = tree.create_var(true);
		assert!(tree.replace_kid(leaf, var));
		assert!(tree.node(leaf).is_none());
		let leaf = tree.kids(var)[0];
		let var2 = tree.create_var(true);
		assert!(tree.replace_kid(leaf, var2));
		let leaf = tree.kids(var2)[0];
		assert_eq!(tree.var_depth(leaf), 2);
		let split = tree.create_split(true);
		assert!(tree.replace_kid(leaf, split));
		let leaves = tree.leaves();
		assert_eq!(leaves, tree.kids(split).to_vec());
		assert!(leaves.iter().all(|leaf| tree.var_depth(*leaf) == 2));
		// root, two vars, a split and three leaves.
		assert_eq!(tree.node_count(), 7);
		let ids: Vec<NodeId> = leaves.iter().filter_map(|leaf| tree.id(*leaf)).collect();
		assert!(ids.windows(2).all(|pair| pair[0] != pair[1]));
	}

	#[test]
	fn test_stale_index() {
		let mut tree = Tree::<()>::with_leaf();
		let old_leaf = tree.leaves()[0];
		let new_leaf = tree.create_leaf();
		tree.replace_kid(old_leaf, new_leaf);
		// The freed slot is reused, but the stale index does not see the new node.
		let reused = tree.create_leaf();
		assert!(tree.node(old_leaf).is_none());
		assert!(tree.node(reused).is_some());
	}

	#[test]
	fn test_find_by_id_after_clone() {
		let mut tree = Tree::<()>::with_leaf();
		let leaf = tree.leaves()[0];
		let var = tree.create_var(true);
		tree.replace_kid(leaf, var);
		let new_leaf = tree.kids(var)[0];
		let id = tree.id(new_leaf).unwrap();
		let copy = tree.clone();
		let found = copy.find_by_id(id).unwrap();
		assert!(copy.leaf(found).is_some());
		assert_eq!(copy.id(found), Some(id));
	}

	#[test]
	fn test_clone_isolation() {
		let mut tree = Tree::<()>::with_leaf();
		let leaf = tree.leaves()[0];
		tree.leaf_mut(leaf).unwrap().probability = 0.25;
		let before = tree.to_json();
		let mut copy = tree.clone();
		let copy_leaf = copy.find_by_id(tree.id(leaf).unwrap()).unwrap();
		copy.leaf_mut(copy_leaf).unwrap().probability = 0.75;
		let var = copy.create_var(true);
		copy.replace_kid(copy_leaf, var);
		assert_eq!(tree.to_json(), before);
		assert_ne!(copy.to_json(), before);
	}

	#[test]
	fn test_to_json() {
		let mut tree = Tree::<()>::with_leaf();
		let leaf = tree.leaves()[0];
		let var = tree.create_var(true);
		tree.replace_kid(leaf, var);
		let leaf = tree.kids(var)[0];
		let split = tree.create_split(true);
		tree.replace_kid(leaf, split);
		insta::assert_snapshot!(serde_json::to_string_pretty(&tree.to_json()).unwrap(), @r###"
  {
    "kids": [
      {
        "kids": [
          {
            "function": null,
            "kids": [
              {
                "kids": [],
                "probability": 0.5,
                "strength": 0.0,
                "type": "Leaf"
              },
              {
                "kids": [],
                "probability": 0.5,
                "strength": 0.0,
                "type": "Leaf"
              },
              {
                "kids": [],
                "probability": 0.5,
                "strength": 0.0,
                "type": "Leaf"
              }
            ],
            "predicate": null,
            "type": "Split",
            "vars": []
          }
        ],
        "type": "Var"
      }
    ],
    "type": "Root"
  }
  "###);
	}
}
