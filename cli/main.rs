//! This module contains the main entrypoint to the concuno cli.

use anyhow::{Context, Result};
use clap::Parser;
use concuno_metrics::{auc_roc, Accuracy, StreamingMetric};
use concuno_tree::{learn, Bag, LearnProgress};
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::path::PathBuf;

mod config;
mod generate;
mod load;

#[derive(Parser)]
#[clap(about = "Learn relational decision trees from labeled bags of entities.")]
enum Options {
	#[clap(name = "learn")]
	Learn(LearnOptions),
	#[clap(name = "generate")]
	Generate(GenerateOptions),
}

#[derive(Parser, Debug)]
#[clap(about = "learn a tree")]
#[clap(long_about = "learn a tree from a json file of labeled bags")]
struct LearnOptions {
	#[clap(short, long, help = "the path to your .json bags file")]
	file: PathBuf,
	#[clap(short, long, help = "the path to a config file")]
	config: Option<PathBuf>,
	#[clap(short, long, help = "the path to write the learned tree to")]
	output: Option<PathBuf>,
	#[clap(long, default_value = "0", help = "the seed for the bootstrap tests")]
	seed: u64,
}

#[derive(Parser, Debug)]
#[clap(about = "generate a synthetic bags file")]
struct GenerateOptions {
	#[clap(short, long, help = "the path to write the .json bags file to")]
	output: PathBuf,
	#[clap(long = "bags", default_value = "120", help = "the number of bags")]
	bag_count: usize,
	#[clap(long, default_value = "0")]
	seed: u64,
}

fn main() {
	let env = env_logger::Env::default().default_filter_or("concuno=info");
	env_logger::Builder::from_env(env)
		.format_level(false)
		.format_module_path(false)
		.format_timestamp(None)
		.init();
	let options = Options::parse();
	let result = match options {
		Options::Learn(options) => cli_learn(options),
		Options::Generate(options) => cli_generate(options),
	};
	if let Err(error) = result {
		eprintln!("error: {:#}", error);
		std::process::exit(1);
	}
}

fn cli_learn(options: LearnOptions) -> Result<()> {
	let config = config::load_config(options.config.as_deref())?;
	let bags_file = load::load_bags_file(&options.file)?;
	let functions = load::functions(&bags_file.properties, config.reframe_enabled())?;
	let mut bags = load::bags(bags_file)?;
	log::info!(
		"loaded {} bags and registered {} functions",
		bags.len(),
		functions.len()
	);

	if let Some(seed) = config.shuffle_seed() {
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		bags.shuffle(&mut rng);
	}

	let learn_options = config.learn_options();
	let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
	let output = learn(
		&bags,
		&functions,
		&learn_options,
		&mut rng,
		&mut |progress| match progress {
			LearnProgress::Expanding {
				leaf_id,
				expansion_count,
			} => log::info!(
				"expanding leaf {} with {} candidates",
				leaf_id,
				expansion_count.total()
			),
			LearnProgress::Verifying(trial_count) => {
				log::debug!("verifying with {} trials", trial_count.total())
			}
		},
	)?;
	for accepted in output.history.iter() {
		log::info!(
			"{} on vars {:?} below leaf {} (p = {})",
			accepted.function,
			accepted.var_indices,
			accepted.leaf_id,
			accepted.p_value
		);
	}

	let (_, validation) = concuno_tree::split_bags(&bags, learn_options.training_fraction);
	report_validation(&output.tree, validation)?;

	let json = serde_json::to_string_pretty(&output.tree.to_json())?;
	match options.output {
		Some(output_path) => {
			std::fs::write(&output_path, json)
				.with_context(|| format!("failed to write tree to {}", output_path.display()))?;
			eprintln!("Your tree was written to {}.", output_path.display());
		}
		None => println!("{}", json),
	}
	Ok(())
}

/// Log how well `tree` classifies the held out bags.
fn report_validation<E>(tree: &concuno_tree::Tree<E>, validation: &[Bag<E>]) -> Result<()> {
	let probabilities = validation
		.iter()
		.map(|bag| Ok(tree.predict(bag)?.unwrap_or(0.0)))
		.collect::<Result<Vec<f64>>>()?;
	let labels: Vec<bool> = validation.iter().map(|bag| bag.label).collect();
	let mut accuracy = Accuracy::new();
	for (probability, label) in probabilities.iter().zip(labels.iter()) {
		accuracy.update((*probability >= 0.5, *label));
	}
	match accuracy.finalize() {
		Some(accuracy) => log::info!("validation accuracy: {}", accuracy),
		None => log::info!("no validation bags to report accuracy on"),
	}
	if let Some(auc) = auc_roc(&probabilities, &labels) {
		log::info!("validation auc: {}", auc);
	}
	Ok(())
}

fn cli_generate(options: GenerateOptions) -> Result<()> {
	let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
	let bags_file = generate::generate(
		&generate::GenerateOptions {
			bag_count: options.bag_count,
		},
		&mut rng,
	)?;
	let file = std::fs::File::create(&options.output)
		.with_context(|| format!("failed to create {}", options.output.display()))?;
	serde_json::to_writer(std::io::BufWriter::new(file), &bags_file)
		.with_context(|| format!("failed to write bags to {}", options.output.display()))?;
	eprintln!(
		"{} bags were written to {}.",
		options.bag_count,
		options.output.display()
	);
	Ok(())
}
