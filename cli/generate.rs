/*!
This module generates synthetic bag files with a planted concept. Every entity has a 2D `Location` and a 1D `Size`. Every positive bag holds one entity close to a hidden target location, and no negative bag holds any entity within `EXCLUSION_RADIUS` of it. `Size` is noise.
*/

use crate::load::{BagRecord, BagsFile, Entity, PropertySchema};
use anyhow::{anyhow, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};

const MIN_ENTITY_COUNT: usize = 2;
const MAX_ENTITY_COUNT: usize = 6;
const WORLD_SIZE: f64 = 10.0;
const TARGET_SPREAD: f64 = 0.3;
const EXCLUSION_RADIUS: f64 = 1.5;

pub struct GenerateOptions {
	pub bag_count: usize,
}

pub fn generate<R: Rng + ?Sized>(options: &GenerateOptions, rng: &mut R) -> Result<BagsFile> {
	let target = [
		rng.gen_range(2.0, WORLD_SIZE - 2.0),
		rng.gen_range(2.0, WORLD_SIZE - 2.0),
	];
	log::debug!("planted target at {:?}", target);
	let near = Normal::new(0.0, TARGET_SPREAD).map_err(|error| anyhow!("{:?}", error))?;
	let bags = (0..options.bag_count)
		.map(|bag_index| {
			let label = bag_index % 2 == 0;
			let entity_count = rng.gen_range(MIN_ENTITY_COUNT, MAX_ENTITY_COUNT + 1);
			let mut entities: Vec<Entity> = (0..entity_count)
				.map(|_| far_entity(target, rng))
				.collect();
			if label {
				let index = rng.gen_range(0, entity_count);
				let location = vec![
					target[0] + near.sample(rng),
					target[1] + near.sample(rng),
				];
				entities[index] = vec![location, vec![rng.gen_range(0.0, 1.0)]];
			}
			BagRecord {
				label,
				entities,
				participants: Vec::new(),
			}
		})
		.collect();
	Ok(BagsFile {
		properties: vec![
			PropertySchema {
				name: "Location".to_owned(),
				count: 2,
				discrete: false,
			},
			PropertySchema {
				name: "Size".to_owned(),
				count: 1,
				discrete: false,
			},
		],
		bags,
	})
}

/// Draw an entity whose location is outside the exclusion radius around `target`.
fn far_entity<R: Rng + ?Sized>(target: [f64; 2], rng: &mut R) -> Entity {
	loop {
		let location = [rng.gen_range(0.0, WORLD_SIZE), rng.gen_range(0.0, WORLD_SIZE)];
		let dx = location[0] - target[0];
		let dy = location[1] - target[1];
		if (dx * dx + dy * dy).sqrt() > EXCLUSION_RADIUS {
			return vec![location.to_vec(), vec![rng.gen_range(0.0, 1.0)]];
		}
	}
}
