/*!
This module contains the statistical machinery used by the learner: the [`Gaussian`](struct.Gaussian.html) whose mean is the center of a learned split, the [`Multinomial`](struct.Multinomial.html) sampler used by the bootstrap significance test, and enumeration of variable index [`permutations`](fn.permutations.html).
*/

use crate::error::{Error, Result};
use itertools::Itertools;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use std::cmp::Ordering;

/// A multivariate gaussian. The covariance starts as the identity. Only its diagonal is used when measuring distances.
#[derive(Clone, Debug, PartialEq)]
pub struct Gaussian {
	pub mean: Array1<f64>,
	pub covariance: Array2<f64>,
}

impl Gaussian {
	pub fn new(mean: Array1<f64>) -> Self {
		let dims = mean.len();
		Self {
			mean,
			covariance: Array2::eye(dims),
		}
	}

	pub fn zeros(dims: usize) -> Self {
		Self::new(Array1::zeros(dims))
	}

	pub fn dims(&self) -> usize {
		self.mean.len()
	}

	/// Compute the distance from `point` to the mean, with each dimension scaled by its variance. Any NaN in `point` yields NaN.
	pub fn mahalanobis_distance(&self, point: &[f64]) -> f64 {
		self.mean
			.iter()
			.zip(point.iter())
			.zip(self.covariance.diag().iter())
			.map(|((mean, value), variance)| {
				let diff = value - mean;
				diff * diff / variance
			})
			.sum::<f64>()
			.sqrt()
	}
}

/// Compute the mean of the rows of `points`, or `None` if there are no rows.
pub fn mean_of_points(points: &[ArrayView1<f64>]) -> Option<Array1<f64>> {
	let first = points.first()?;
	let mut mean = Array1::<f64>::zeros(first.len());
	for point in points {
		mean += point;
	}
	mean /= points.len().to_f64()?;
	Some(mean)
}

/// Enumerate every ordered selection of `count` distinct indexes from `0..options`, in lexicographic order.
pub fn permutations(options: usize, count: usize) -> impl Iterator<Item = Vec<usize>> {
	(0..options).permutations(count)
}

/**
A `Multinomial` draws how `count` trials fall among a fixed set of classes.

It samples as a chain of binomials over the classes in order of decreasing probability. Each class succeeds with its probability conditioned on the trials not yet claimed by earlier classes, and the last class takes whatever remains.
*/
#[derive(Clone, Debug)]
pub struct Multinomial {
	count: u64,
	class_count: usize,
	/// The classes in sampling order, each with its conditional probability.
	conditionals: Vec<(usize, f64)>,
}

impl Multinomial {
	pub fn new(count: u64, probabilities: &[f64]) -> Result<Self> {
		let sum: f64 = probabilities.iter().sum();
		if !((sum - 1.0).abs() <= 1e-6) {
			return Err(Error::InvalidMultinomial { sum });
		}
		let mut order: Vec<usize> = (0..probabilities.len()).collect();
		order.sort_by(|a, b| {
			probabilities[*b]
				.partial_cmp(&probabilities[*a])
				.unwrap_or(Ordering::Equal)
		});
		let mut remaining = 1.0;
		let conditionals = order
			.into_iter()
			.map(|class| {
				let probability = probabilities[class];
				let conditional = if probability > 0.0 && remaining > 0.0 {
					(probability / remaining).min(1.0).max(0.0)
				} else {
					0.0
				};
				remaining -= probability;
				(class, conditional)
			})
			.collect();
		Ok(Self {
			count,
			class_count: probabilities.len(),
			conditionals,
		})
	}

	pub fn class_count(&self) -> usize {
		self.class_count
	}

	/// Draw a sample, writing the count for each class to `out`, which must have `class_count` items.
	pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [u64]) -> Result<()> {
		let mut remaining = self.count;
		let last = self.conditionals.len().saturating_sub(1);
		for (position, (class, conditional)) in self.conditionals.iter().enumerate() {
			let drawn = if position == last {
				remaining
			} else if remaining == 0 || *conditional <= 0.0 {
				0
			} else {
				let binomial =
					Binomial::new(remaining, *conditional).map_err(|_| Error::InvalidBinomial)?;
				binomial.sample(rng)
			};
			out[*class] = drawn;
			remaining -= drawn;
		}
		Ok(())
	}
}
