//! Manifest serialization.
//!
//! Manifests are written with their keys sorted the way Go YAML marshalers sort them, so that
//! a backup taken by this tool diffs cleanly against one produced by `kubectl get -o yaml`.

use std::cmp::Ordering;

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::instrument;

use crate::k8s::object::ResourceObject;

#[derive(Debug, Error)]
pub enum SerializeError {
	#[error("failed to convert object to a JSON tree")]
	Json(#[from] serde_json::Error),

	#[error("failed to render YAML")]
	Yaml(#[from] serde_yaml::Error),
}

/// Sort all object keys recursively in Go YAML key order.
pub fn sort_json_keys(value: JsonValue) -> JsonValue {
	match value {
		JsonValue::Object(map) => {
			let mut entries: Vec<(String, JsonValue)> = map.into_iter().collect();
			entries.sort_by(|(a, _), (b, _)| go_yaml_key_compare(a, b));
			JsonValue::Object(
				entries
					.into_iter()
					.map(|(k, v)| (k, sort_json_keys(v)))
					.collect::<Map<_, _>>(),
			)
		}
		JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(sort_json_keys).collect()),
		other => other,
	}
}

/// Natural key order used by go-yaml (`sorter.go`).
///
/// Runs of digits compare numerically. At the first difference between a letter and a
/// non-letter, the letter sorts first right after a digit and last everywhere else.
fn go_yaml_key_compare(a: &str, b: &str) -> Ordering {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();
	let mut after_digit = false;

	for i in 0..a.len().min(b.len()) {
		if a[i] == b[i] {
			after_digit = a[i].is_ascii_digit();
			continue;
		}

		let a_letter = a[i].is_alphabetic();
		let b_letter = b[i].is_alphabetic();
		if a_letter && b_letter {
			return a[i].cmp(&b[i]);
		}
		if a_letter || b_letter {
			let letter_first = if a_letter {
				Ordering::Less
			} else {
				Ordering::Greater
			};
			return if after_digit {
				letter_first
			} else {
				letter_first.reverse()
			};
		}

		// A zero continuing a non-zero number is an ordinary digit, not a leading zero.
		let mut a_num: u64 = 0;
		let mut b_num: u64 = 0;
		if (a[i] == '0' || b[i] == '0')
			&& a[..i]
				.iter()
				.rev()
				.take_while(|c| c.is_ascii_digit())
				.any(|&c| c != '0')
		{
			a_num = 1;
			b_num = 1;
		}

		let (a_num, a_end) = accumulate_digits(&a, i, a_num);
		let (b_num, b_end) = accumulate_digits(&b, i, b_num);
		if a_num != b_num {
			return a_num.cmp(&b_num);
		}
		if a_end != b_end {
			return a_end.cmp(&b_end);
		}
		return a[i].cmp(&b[i]);
	}

	a.len().cmp(&b.len())
}

/// Fold the digit run starting at `start` into `acc`; returns the value and the run end.
fn accumulate_digits(chars: &[char], start: usize, mut acc: u64) -> (u64, usize) {
	let mut end = start;
	while let Some(digit) = chars.get(end).and_then(|c| c.to_digit(10)) {
		acc = acc.saturating_mul(10).saturating_add(u64::from(digit));
		end += 1;
	}
	(acc, end)
}

/// Serialize a cleaned object as a YAML manifest.
#[instrument(skip_all)]
pub fn to_yaml(obj: &ResourceObject) -> Result<String, SerializeError> {
	let value = sort_json_keys(serde_json::to_value(obj)?);
	Ok(serde_yaml::to_string(&value)?)
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use k8s_openapi::{
		api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta,
	};
	use serde_json::json;

	use super::*;

	fn sorted(keys: &[&str]) -> Vec<String> {
		let mut keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
		keys.sort_by(|a, b| go_yaml_key_compare(a, b));
		keys
	}

	#[test]
	fn test_plain_keys_sort_lexically() {
		assert_eq!(
			sorted(&["spec", "metadata", "kind", "apiVersion"]),
			["apiVersion", "kind", "metadata", "spec"]
		);
	}

	#[test]
	fn test_numbers_sort_numerically() {
		assert_eq!(sorted(&["item10", "item2", "item1"]), ["item1", "item2", "item10"]);
	}

	#[test]
	fn test_non_letters_before_letters() {
		assert_eq!(sorted(&["a_b", "ab"]), ["a_b", "ab"]);
	}

	#[test]
	fn test_letters_first_after_digits() {
		assert_eq!(sorted(&["1_", "1a"]), ["1a", "1_"]);
	}

	#[test]
	fn test_sort_json_keys_recursive() {
		let value = sort_json_keys(json!({
			"b": [{"z": 1, "a": 2}],
			"a": {"y": 1, "x": 2},
		}));
		assert_eq!(
			serde_json::to_string(&value).unwrap(),
			r#"{"a":{"x":2,"y":1},"b":[{"a":2,"z":1}]}"#
		);
	}

	#[test]
	fn test_to_yaml_typed() {
		let obj = ResourceObject::from(ConfigMap {
			metadata: ObjectMeta {
				name: Some("settings".to_string()),
				namespace: Some("prod".to_string()),
				..Default::default()
			},
			data: Some([("mode".to_string(), "fast".to_string())].into()),
			..Default::default()
		});

		assert_eq!(
			to_yaml(&obj).unwrap(),
			indoc! {"
                apiVersion: v1
                data:
                  mode: fast
                kind: ConfigMap
                metadata:
                  name: settings
                  namespace: prod
            "}
		);
	}

	#[test]
	fn test_to_yaml_unstructured() {
		let obj = ResourceObject::from(json!({
			"kind": "Widget",
			"apiVersion": "example.com/v1",
			"spec": {"size": 3, "tags": ["a", "b"]},
			"metadata": {"name": "w"},
		}));

		assert_eq!(
			to_yaml(&obj).unwrap(),
			indoc! {"
                apiVersion: example.com/v1
                kind: Widget
                metadata:
                  name: w
                spec:
                  size: 3
                  tags:
                  - a
                  - b
            "}
		);
	}
}
