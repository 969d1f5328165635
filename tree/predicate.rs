/*!
A split applies a [`Predicate`](trait.Predicate.html) to the values its entity function produces. The predicate learned for every split is a [`DistanceThreshold`](struct.DistanceThreshold.html), which accepts points within some distance of a center, measured by a [`Function`](trait.Function.html) such as [`MahalanobisDistance`](struct.MahalanobisDistance.html).
*/

use crate::stats::Gaussian;
use serde_json::json;
use std::fmt;

/// A `Function` maps a vector of values to another vector of values.
pub trait Function: fmt::Debug + Send + Sync {
	fn in_count(&self) -> usize;
	fn out_count(&self) -> usize;
	/// `input` has `in_count` items and `output` has `out_count` items.
	fn evaluate(&self, input: &[f64], output: &mut [f64]);
	fn to_json(&self) -> serde_json::Value;
	fn clone_box(&self) -> Box<dyn Function>;
}

impl Clone for Box<dyn Function> {
	fn clone(&self) -> Self {
		self.clone_box()
	}
}

pub trait Predicate: fmt::Debug + Send + Sync {
	/// Decide whether a point goes to the `yes` child. Points with NaN values never reach a predicate.
	fn evaluate(&self, point: &[f64]) -> bool;
	fn to_json(&self) -> serde_json::Value;
	fn clone_box(&self) -> Box<dyn Predicate>;
}

impl Clone for Box<dyn Predicate> {
	fn clone(&self) -> Self {
		self.clone_box()
	}
}

/// The distance from a point to the mean of a `Gaussian`, scaled by its covariance.
#[derive(Clone, Debug)]
pub struct MahalanobisDistance {
	pub gaussian: Gaussian,
}

impl MahalanobisDistance {
	pub fn new(gaussian: Gaussian) -> Self {
		Self { gaussian }
	}

	pub fn distance(&self, point: &[f64]) -> f64 {
		self.gaussian.mahalanobis_distance(point)
	}
}

impl Function for MahalanobisDistance {
	fn in_count(&self) -> usize {
		self.gaussian.dims()
	}

	fn out_count(&self) -> usize {
		1
	}

	fn evaluate(&self, input: &[f64], output: &mut [f64]) {
		output[0] = self.distance(input);
	}

	fn to_json(&self) -> serde_json::Value {
		json!({
			"name": "MahalanobisDistance",
			"center": self.gaussian.mean.to_vec(),
		})
	}

	fn clone_box(&self) -> Box<dyn Function> {
		Box::new(self.clone())
	}
}

/// A `DistanceThreshold` accepts points whose distance, as computed by `distance`, is at most `threshold`.
#[derive(Clone, Debug)]
pub struct DistanceThreshold {
	/// This function must have an `out_count` of 1.
	pub distance: Box<dyn Function>,
	pub threshold: f64,
}

impl DistanceThreshold {
	pub fn new(distance: Box<dyn Function>, threshold: f64) -> Self {
		Self {
			distance,
			threshold,
		}
	}
}

impl Predicate for DistanceThreshold {
	fn evaluate(&self, point: &[f64]) -> bool {
		let mut distance = [0.0];
		self.distance.evaluate(point, &mut distance);
		distance[0] <= self.threshold
	}

	fn to_json(&self) -> serde_json::Value {
		json!({
			"name": "DistanceThreshold",
			"function": self.distance.to_json(),
			"threshold": self.threshold,
		})
	}

	fn clone_box(&self) -> Box<dyn Predicate> {
		Box::new(self.clone())
	}
}
