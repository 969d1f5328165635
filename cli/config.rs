/*!
This module defines the `Config` struct, which is read from the YAML file passed to `concuno learn --config` and overrides the default [`LearnOptions`](../../concuno_tree/struct.LearnOptions.html).
*/

use anyhow::{Context, Result};
use concuno_tree::LearnOptions;
use std::path::Path;

#[derive(Debug, Default, serde::Deserialize)]
pub struct Config {
	pub significance_threshold: Option<f64>,
	pub bootstrap_trials: Option<usize>,
	pub probability_prior: Option<f64>,
	pub max_center_bags_per_label: Option<usize>,
	pub training_fraction: Option<f64>,
	pub max_expansions: Option<usize>,
	pub require_label_direction: Option<bool>,
	/// Also register a `Reframe` function for every float property.
	pub reframe: Option<bool>,
	pub shuffle: Option<Shuffle>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum Shuffle {
	Enabled(bool),
	Options { seed: u64 },
}

const DEFAULT_SHUFFLE_SEED: u64 = 42;

impl Config {
	pub fn learn_options(&self) -> LearnOptions {
		let defaults = LearnOptions::default();
		LearnOptions {
			significance_threshold: self
				.significance_threshold
				.unwrap_or(defaults.significance_threshold),
			bootstrap_trials: self.bootstrap_trials.unwrap_or(defaults.bootstrap_trials),
			probability_prior: self.probability_prior.unwrap_or(defaults.probability_prior),
			max_center_bags_per_label: self
				.max_center_bags_per_label
				.unwrap_or(defaults.max_center_bags_per_label),
			training_fraction: self.training_fraction.unwrap_or(defaults.training_fraction),
			max_expansions: self.max_expansions.or(defaults.max_expansions),
			require_label_direction: self
				.require_label_direction
				.unwrap_or(defaults.require_label_direction),
		}
	}

	pub fn reframe_enabled(&self) -> bool {
		self.reframe.unwrap_or(false)
	}

	/// The seed to shuffle the bags with, or `None` if shuffling is disabled. Shuffling is on by default.
	pub fn shuffle_seed(&self) -> Option<u64> {
		match &self.shuffle {
			None | Some(Shuffle::Enabled(true)) => Some(DEFAULT_SHUFFLE_SEED),
			Some(Shuffle::Enabled(false)) => None,
			Some(Shuffle::Options { seed }) => Some(*seed),
		}
	}
}

pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
	if let Some(config_path) = config_path {
		let config = std::fs::read_to_string(config_path)
			.with_context(|| format!("failed to read config file {}", config_path.display()))?;
		let config = serde_yaml::from_str(&config)
			.with_context(|| format!("failed to parse config file {}", config_path.display()))?;
		Ok(config)
	} else {
		Ok(Config::default())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = Config::default();
		let options = config.learn_options();
		assert_eq!(options.bootstrap_trials, 10_000);
		assert!(!config.reframe_enabled());
		assert_eq!(config.shuffle_seed(), Some(DEFAULT_SHUFFLE_SEED));
	}

	#[test]
	fn test_overrides() {
		let config: Config = serde_yaml::from_str(
			"significance_threshold: 0.05\nmax_expansions: 2\nreframe: true\nshuffle:\n  seed: 7\n",
		)
		.unwrap();
		let options = config.learn_options();
		assert!((options.significance_threshold - 0.05).abs() < 1e-12);
		assert_eq!(options.max_expansions, Some(2));
		assert_eq!(options.probability_prior, 1.0);
		assert!(config.reframe_enabled());
		assert_eq!(config.shuffle_seed(), Some(7));
		let config: Config = serde_yaml::from_str("shuffle: false\n").unwrap();
		assert_eq!(config.shuffle_seed(), None);
	}
}
