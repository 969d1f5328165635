/*!
Entity functions map a fixed-arity tuple of entities to a vector of numbers. A split evaluates one on the entities its variables are bound to, and then applies a predicate to the result.

Arguments are `Option`s because a variable may have found no entity to bind. Functions should write NaN for any output they cannot compute, and the split will route such points to its `err` child.
*/

use crate::error::{Error, Result};
use std::{fmt, sync::Arc};

/// The type of the values an entity function outputs. All outputs are stored as `f64`, but only `Float` outputs support arithmetic such as differences and distances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
	Float,
	Discrete,
}

pub trait EntityFunction<E>: Send + Sync {
	/// The name used when printing or exporting a tree.
	fn name(&self) -> &str;
	/// The number of entities the function takes.
	fn in_count(&self) -> usize;
	/// The number of values the function writes.
	fn out_count(&self) -> usize;
	fn out_type(&self) -> ValueType {
		ValueType::Float
	}
	/// Evaluate the function. `entities` has `in_count` items and `out` has `out_count` items.
	fn get(&self, entities: &[Option<&E>], out: &mut [f64]);
}

impl<E> fmt::Debug for dyn EntityFunction<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.name(), self.in_count())
	}
}

/// Check that `base` outputs floats, which composite functions require.
fn require_float<E>(base: &dyn EntityFunction<E>, composite: &str) -> Result<()> {
	if base.out_type() != ValueType::Float {
		return Err(Error::SchemaMismatch(format!(
			"{} requires float values but {} outputs {:?}",
			composite,
			base.name(),
			base.out_type(),
		)));
	}
	if base.in_count() != 1 {
		return Err(Error::SchemaMismatch(format!(
			"{} requires a single entity property but {} takes {}",
			composite,
			base.name(),
			base.in_count(),
		)));
	}
	Ok(())
}

/// A `Property` reads a fixed number of values from a single entity.
pub struct Property<E> {
	name: String,
	count: usize,
	out_type: ValueType,
	#[allow(clippy::type_complexity)]
	get: Box<dyn Fn(&E, &mut [f64]) + Send + Sync>,
}

impl<E> Property<E> {
	/// Create a property named `name` that writes `count` values. A property must write at least one value.
	pub fn new(
		name: impl Into<String>,
		count: usize,
		get: impl Fn(&E, &mut [f64]) + Send + Sync + 'static,
	) -> Result<Self> {
		let name = name.into();
		if count == 0 {
			return Err(Error::SchemaMismatch(format!(
				"property {} has no values",
				name
			)));
		}
		Ok(Self {
			name,
			count,
			out_type: ValueType::Float,
			get: Box::new(get),
		})
	}

	/// Mark this property's values as discrete codes rather than floats.
	pub fn discrete(mut self) -> Self {
		self.out_type = ValueType::Discrete;
		self
	}
}

impl<E> EntityFunction<E> for Property<E> {
	fn name(&self) -> &str {
		&self.name
	}

	fn in_count(&self) -> usize {
		1
	}

	fn out_count(&self) -> usize {
		self.count
	}

	fn out_type(&self) -> ValueType {
		self.out_type
	}

	fn get(&self, entities: &[Option<&E>], out: &mut [f64]) {
		match entities.first().cloned().flatten() {
			Some(entity) => (self.get)(entity, out),
			None => out.iter_mut().for_each(|value| *value = std::f64::NAN),
		}
	}
}

/// `Difference` subtracts a float property of its second entity from the same property of its first.
pub struct Difference<E> {
	base: Arc<dyn EntityFunction<E>>,
	name: String,
}

impl<E> Difference<E> {
	pub fn new(base: Arc<dyn EntityFunction<E>>) -> Result<Self> {
		require_float(base.as_ref(), "Difference")?;
		let name = format!("Difference{}", base.name());
		Ok(Self { base, name })
	}
}

impl<E> EntityFunction<E> for Difference<E> {
	fn name(&self) -> &str {
		&self.name
	}

	fn in_count(&self) -> usize {
		2
	}

	fn out_count(&self) -> usize {
		self.base.out_count()
	}

	fn get(&self, entities: &[Option<&E>], out: &mut [f64]) {
		difference(self.base.as_ref(), entities, out);
	}
}

fn difference<E>(base: &dyn EntityFunction<E>, entities: &[Option<&E>], out: &mut [f64]) {
	let mut other = vec![0.0; base.out_count()];
	base.get(&entities[0..1], out);
	base.get(&entities[1..2], &mut other);
	for (value, other) in out.iter_mut().zip(other.iter()) {
		*value -= other;
	}
}

/// `Distance` is the euclidean norm of a `Difference`.
pub struct Distance<E> {
	base: Arc<dyn EntityFunction<E>>,
	name: String,
}

impl<E> Distance<E> {
	pub fn new(base: Arc<dyn EntityFunction<E>>) -> Result<Self> {
		require_float(base.as_ref(), "Distance")?;
		let name = format!("Distance{}", base.name());
		Ok(Self { base, name })
	}
}

impl<E> EntityFunction<E> for Distance<E> {
	fn name(&self) -> &str {
		&self.name
	}

	fn in_count(&self) -> usize {
		2
	}

	fn out_count(&self) -> usize {
		1
	}

	fn get(&self, entities: &[Option<&E>], out: &mut [f64]) {
		let mut diff = vec![0.0; self.base.out_count()];
		difference(self.base.as_ref(), entities, &mut diff);
		out[0] = diff.iter().map(|value| value * value).sum::<f64>().sqrt();
	}
}

/// `Reframe` expresses a property of its third entity in the frame where its first entity is the origin and its second lies at one unit along the first axis.
pub struct Reframe<E> {
	base: Arc<dyn EntityFunction<E>>,
	name: String,
}

impl<E> Reframe<E> {
	pub fn new(base: Arc<dyn EntityFunction<E>>) -> Result<Self> {
		require_float(base.as_ref(), "Reframe")?;
		let name = format!("Reframe{}", base.name());
		Ok(Self { base, name })
	}
}

impl<E> EntityFunction<E> for Reframe<E> {
	fn name(&self) -> &str {
		&self.name
	}

	fn in_count(&self) -> usize {
		3
	}

	fn out_count(&self) -> usize {
		self.base.out_count()
	}

	fn get(&self, entities: &[Option<&E>], out: &mut [f64]) {
		let size = self.base.out_count();
		let mut origin = vec![0.0; size];
		let mut target = vec![0.0; size];
		self.base.get(&entities[0..1], &mut origin);
		self.base.get(&entities[1..2], &mut target);
		self.base.get(&entities[2..3], out);
		reframe(&origin, &mut target, out);
	}
}

/**
Transform `point` into the frame with `origin` at zero and `target` at `(1, 0, ...)`. The frame is translated, then rotated one `(0, i)` plane at a time with givens rotations until the target lies on the first axis, then scaled so the target has unit length. `target` is left holding the transformed target.
*/
pub fn reframe(origin: &[f64], target: &mut [f64], point: &mut [f64]) {
	let size = point.len();
	for i in 0..size {
		target[i] -= origin[i];
		point[i] -= origin[i];
	}
	for i in 1..size {
		let x = target[0];
		let y = target[i];
		let (cosine, sine, radius) = if y == 0.0 {
			(1f64.copysign(x), 0.0, x.abs())
		} else if x == 0.0 {
			(0.0, -(1f64.copysign(y)), y.abs())
		} else if x.abs() >= y.abs() {
			let ratio = x / y;
			let radius = (1.0 + ratio * ratio).sqrt().copysign(y);
			let sine = -1.0 / radius;
			(-sine * ratio, sine, radius * y)
		} else {
			let ratio = y / x;
			let radius = (1.0 + ratio * ratio).sqrt().copysign(x);
			let cosine = 1.0 / radius;
			(cosine, -cosine * ratio, radius * x)
		};
		target[0] = radius;
		target[i] = 0.0;
		let first = point[0];
		point[0] = first * cosine - point[i] * sine;
		point[i] = first * sine + point[i] * cosine;
	}
	if size > 0 {
		let scale = target[0];
		point.iter_mut().for_each(|value| *value /= scale);
		target[0] = 1.0;
	}
}

/// `Valid` outputs 1 if every one of its `arity` entities is bound and 0 otherwise.
pub struct Valid {
	arity: usize,
}

impl Valid {
	pub fn new(arity: usize) -> Self {
		Self { arity }
	}
}

impl<E> EntityFunction<E> for Valid {
	fn name(&self) -> &str {
		"Valid"
	}

	fn in_count(&self) -> usize {
		self.arity
	}

	fn out_count(&self) -> usize {
		1
	}

	fn get(&self, entities: &[Option<&E>], out: &mut [f64]) {
		out[0] = if entities.iter().all(Option::is_some) {
			1.0
		} else {
			0.0
		};
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn location() -> Arc<dyn EntityFunction<[f64; 2]>> {
		Arc::new(
			Property::new("Location", 2, |entity: &[f64; 2], out| {
				out.copy_from_slice(entity)
			})
			.unwrap(),
		)
	}

	#[test]
	fn test_property_writes_nan_for_unbound() {
		let location = location();
		let mut out = [0.0; 2];
		location.get(&[None], &mut out);
		assert!(out.iter().all(|value| value.is_nan()));
		location.get(&[Some(&[1.0, 2.0])], &mut out);
		assert_eq!(out, [1.0, 2.0]);
	}

	#[test]
	fn test_difference_and_distance() {
		let difference = Difference::new(location()).unwrap();
		let distance = Distance::new(location()).unwrap();
		assert_eq!(difference.name(), "DifferenceLocation");
		assert_eq!(distance.name(), "DistanceLocation");
		let a = [4.0, 6.0];
		let b = [1.0, 2.0];
		let mut out = [0.0; 2];
		difference.get(&[Some(&a), Some(&b)], &mut out);
		assert_eq!(out, [3.0, 4.0]);
		let mut out = [0.0];
		distance.get(&[Some(&a), Some(&b)], &mut out);
		assert!((out[0] - 5.0).abs() < 1e-12);
		distance.get(&[Some(&a), None], &mut out);
		assert!(out[0].is_nan());
	}

	#[test]
	fn test_composites_require_floats() {
		let color: Arc<dyn EntityFunction<[f64; 2]>> =
			Arc::new(Property::new("Color", 1, |_: &[f64; 2], out| out[0] = 1.0)
				.unwrap()
				.discrete());
		assert!(matches!(
			Difference::new(color.clone()),
			Err(Error::SchemaMismatch(_))
		));
		assert!(matches!(Distance::new(color.clone()), Err(Error::SchemaMismatch(_))));
		assert!(matches!(Reframe::new(color), Err(Error::SchemaMismatch(_))));
	}

	#[test]
	fn test_property_requires_values() {
		let empty = Property::new("Empty", 0, |_: &[f64; 2], _: &mut [f64]| {});
		insta::assert_snapshot!(empty.err().unwrap().to_string(), @"schema mismatch: property Empty has no values");
	}

	#[test]
	fn test_reframe() {
		let origin = [1.0, 1.0];
		let mut target = [1.0, 3.0];
		let mut point = [1.0, 3.0];
		reframe(&origin, &mut target.clone(), &mut point);
		assert!((point[0] - 1.0).abs() < 1e-12);
		assert!(point[1].abs() < 1e-12);
		let mut point = [1.0, 1.0];
		reframe(&origin, &mut target, &mut point);
		assert!(point.iter().all(|value| value.abs() < 1e-12));
		assert!((target[0] - 1.0).abs() < 1e-12);
		assert!(target[1].abs() < 1e-12);
		// A point one unit to the left of the direction of travel.
		let mut point = [0.0, 3.0];
		reframe(&origin, &mut [1.0, 3.0], &mut point);
		assert!((point[0] - 1.0).abs() < 1e-12);
		assert!((point[1].abs() - 0.5).abs() < 1e-12);
	}

	#[test]
	fn test_reframe_function() {
		let reframe = Reframe::new(location()).unwrap();
		assert_eq!(reframe.in_count(), 3);
		let mut out = [0.0; 2];
		reframe.get(&[Some(&[0.0, 0.0]), Some(&[2.0, 0.0]), Some(&[1.0, 1.0])], &mut out);
		assert!((out[0] - 0.5).abs() < 1e-12);
		assert!((out[1] - 0.5).abs() < 1e-12);
	}

	#[test]
	fn test_valid() {
		let valid = Valid::new(2);
		let mut out = [0.0];
		EntityFunction::<char>::get(&valid, &[Some(&'a'), Some(&'b')], &mut out);
		assert_eq!(out[0], 1.0);
		EntityFunction::<char>::get(&valid, &[Some(&'a'), None], &mut out);
		assert_eq!(out[0], 0.0);
	}
}
