/*!
This module reads and writes the JSON bag files the command line learns from. A file lists the properties every entity has, then the bags:

```json
{
	"properties": [{ "name": "Location", "count": 2 }],
	"bags": [
		{ "label": true, "entities": [[[0.5, 1.0]], [[3.0, 2.0]]], "participants": [[0]] }
	]
}
```

Each entity holds one vector of values per property, in the order the properties are listed. `participants` optionally restricts, for each variable depth, which entities a variable at that depth may bind.
*/

use anyhow::{bail, Context, Result};
use concuno_tree::{Bag, Difference, Distance, EntityFunction, Property, Reframe, Valid};
use std::{path::Path, sync::Arc};

/// One vector of values per property.
pub type Entity = Vec<Vec<f64>>;

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct BagsFile {
	pub properties: Vec<PropertySchema>,
	pub bags: Vec<BagRecord>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct PropertySchema {
	pub name: String,
	pub count: usize,
	/// Discrete properties are only split on directly, never differenced.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub discrete: bool,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct BagRecord {
	pub label: bool,
	pub entities: Vec<Entity>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub participants: Vec<Vec<usize>>,
}

pub fn load_bags_file(path: &Path) -> Result<BagsFile> {
	let file = std::fs::File::open(path)
		.with_context(|| format!("failed to open bags file {}", path.display()))?;
	let bags_file: BagsFile = serde_json::from_reader(std::io::BufReader::new(file))
		.with_context(|| format!("failed to parse bags file {}", path.display()))?;
	Ok(bags_file)
}

/// Check every entity against the property schema and build the bags.
pub fn bags(bags_file: BagsFile) -> Result<Vec<Bag<Entity>>> {
	let BagsFile { properties, bags } = bags_file;
	if let Some(property) = properties.iter().find(|property| property.count == 0) {
		bail!("property {} must have at least one value", property.name);
	}
	bags.into_iter()
		.enumerate()
		.map(|(bag_index, record)| {
			for (entity_index, entity) in record.entities.iter().enumerate() {
				if entity.len() != properties.len() {
					bail!(
						"bag {} entity {} has {} properties but {} are declared",
						bag_index,
						entity_index,
						entity.len(),
						properties.len()
					);
				}
				for (values, property) in entity.iter().zip(properties.iter()) {
					if values.len() != property.count {
						bail!(
							"bag {} entity {} has {} values for {} but {} are declared",
							bag_index,
							entity_index,
							values.len(),
							property.name,
							property.count
						);
					}
				}
			}
			let entity_count = record.entities.len();
			let mut bag = Bag::new(record.entities, record.label);
			for (depth, participants) in record.participants.into_iter().enumerate() {
				for participant in participants {
					if participant >= entity_count {
						bail!(
							"bag {} names participant {} but has {} entities",
							bag_index,
							participant,
							entity_count
						);
					}
					bag.push_participant(depth, participant);
				}
			}
			Ok(bag)
		})
		.collect()
}

/// Register the functions the learner may split on: each property, the difference and distance between two entities' values of each float property, and whether one or two variables are bound.
pub fn functions(
	properties: &[PropertySchema],
	reframe: bool,
) -> Result<Vec<Arc<dyn EntityFunction<Entity>>>> {
	let mut functions: Vec<Arc<dyn EntityFunction<Entity>>> = Vec::new();
	for (property_index, schema) in properties.iter().enumerate() {
		let property = Property::new(
			schema.name.clone(),
			schema.count,
			move |entity: &Entity, out: &mut [f64]| {
				out.copy_from_slice(&entity[property_index]);
			},
		)?;
		let property: Arc<dyn EntityFunction<Entity>> = if schema.discrete {
			Arc::new(property.discrete())
		} else {
			Arc::new(property)
		};
		functions.push(property.clone());
		if schema.discrete {
			continue;
		}
		functions.push(Arc::new(Difference::new(property.clone())?));
		functions.push(Arc::new(Distance::new(property.clone())?));
		if reframe {
			functions.push(Arc::new(Reframe::new(property)?));
		}
	}
	functions.push(Arc::new(Valid::new(1)));
	functions.push(Arc::new(Valid::new(2)));
	Ok(functions)
}

#[cfg(test)]
mod test {
	use super::*;

	fn bags_file(json: &str) -> BagsFile {
		serde_json::from_str(json).unwrap()
	}

	#[test]
	fn test_bags() {
		let bags = bags(bags_file(
			r#"{
				"properties": [{ "name": "Location", "count": 2 }, { "name": "Color", "count": 1, "discrete": true }],
				"bags": [
					{ "label": true, "entities": [[[0.5, 1.0], [2]], [[3.0, 2.0], [1]]], "participants": [[1]] },
					{ "label": false, "entities": [] }
				]
			}"#,
		))
		.unwrap();
		assert_eq!(bags.len(), 2);
		assert!(bags[0].label);
		assert_eq!(bags[0].entities.len(), 2);
		assert_eq!(bags[0].options_at_depth(0), vec![1]);
		assert_eq!(bags[0].options_at_depth(1), vec![0, 1]);
		assert!(bags[1].entities.is_empty());
	}

	#[test]
	fn test_bags_rejects_wrong_value_count() {
		let result = bags(bags_file(
			r#"{
				"properties": [{ "name": "Location", "count": 2 }],
				"bags": [{ "label": true, "entities": [[[0.5]]] }]
			}"#,
		));
		insta::assert_snapshot!(result.unwrap_err().to_string(), @"bag 0 entity 0 has 1 values for Location but 2 are declared");
	}

	#[test]
	fn test_bags_rejects_empty_property() {
		let result = bags(bags_file(
			r#"{
				"properties": [{ "name": "Nothing", "count": 0 }],
				"bags": [{ "label": true, "entities": [[[]]] }]
			}"#,
		));
		insta::assert_snapshot!(result.unwrap_err().to_string(), @"property Nothing must have at least one value");
		let properties = vec![PropertySchema {
			name: "Nothing".to_owned(),
			count: 0,
			discrete: false,
		}];
		assert!(functions(&properties, false).is_err());
	}

	#[test]
	fn test_bags_rejects_missing_participant() {
		let result = bags(bags_file(
			r#"{
				"properties": [{ "name": "Location", "count": 1 }],
				"bags": [{ "label": true, "entities": [[[0.5]]], "participants": [[3]] }]
			}"#,
		));
		insta::assert_snapshot!(result.unwrap_err().to_string(), @"bag 0 names participant 3 but has 1 entities");
	}

	#[test]
	fn test_functions() {
		let properties = vec![
			PropertySchema {
				name: "Location".to_owned(),
				count: 2,
				discrete: false,
			},
			PropertySchema {
				name: "Color".to_owned(),
				count: 1,
				discrete: true,
			},
		];
		let names = |reframe| {
			functions(&properties, reframe)
				.unwrap()
				.iter()
				.map(|function| format!("{}/{}", function.name(), function.in_count()))
				.collect::<Vec<_>>()
		};
		insta::assert_debug_snapshot!(names(false), @r###"
  [
      "Location/1",
      "DifferenceLocation/2",
      "DistanceLocation/2",
      "Color/1",
      "Valid/1",
      "Valid/2",
  ]
  "###);
		assert!(names(true).contains(&"ReframeLocation/3".to_owned()));
	}

	#[test]
	fn test_property_reads_entity_values() {
		let properties = vec![PropertySchema {
			name: "Location".to_owned(),
			count: 2,
			discrete: false,
		}];
		let functions = functions(&properties, false).unwrap();
		let entity: Entity = vec![vec![1.5, -2.0]];
		let mut out = [0.0; 2];
		functions[0].get(&[Some(&entity)], &mut out);
		assert_eq!(out, [1.5, -2.0]);
		functions[0].get(&[None], &mut out);
		assert!(out.iter().all(|value| value.is_nan()));
	}
}
