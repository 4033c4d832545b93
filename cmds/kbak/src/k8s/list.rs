//! Uniform item extraction from listing results.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::api::{DynamicObject, ObjectList};
use serde_json::Value as JsonValue;

use super::object::ResourceObject;

/// A list returned by the listing API.
#[derive(Debug)]
pub enum ListResult {
	/// A list of one of the compiled kinds.
	Typed {
		metadata: ListMeta,
		items: Vec<ResourceObject>,
	},
	/// A list of discovered kinds without a compiled model.
	Dynamic(ObjectList<DynamicObject>),
	/// Anything else; items are found by shape, if at all.
	Unstructured(JsonValue),
}

impl<K> From<ObjectList<K>> for ListResult
where
	K: Clone + Into<ResourceObject>,
{
	fn from(list: ObjectList<K>) -> Self {
		Self::Typed {
			metadata: list.metadata,
			items: list.items.into_iter().map(Into::into).collect(),
		}
	}
}

impl ListResult {
	/// Split the list into its items and the total number of objects the server holds.
	///
	/// For paginated listings the total includes the `remainingItemCount` the server
	/// reported for the pages that were not fetched. Shapes that carry no recognizable item
	/// sequence yield `([], 0)`.
	pub fn extract(self) -> (Vec<ResourceObject>, usize) {
		match self {
			Self::Typed { metadata, items } => {
				let total = items.len() + remaining_items(&metadata);
				(items, total)
			}
			Self::Dynamic(list) => {
				let total = list.items.len() + remaining_items(&list.metadata);
				let items = list.items.into_iter().filter_map(into_unstructured).collect();
				(items, total)
			}
			Self::Unstructured(JsonValue::Object(mut map)) => match map.remove("items") {
				Some(JsonValue::Array(items)) => {
					let count = items.len();
					(items.into_iter().map(ResourceObject::from).collect(), count)
				}
				_ => (Vec::new(), 0),
			},
			Self::Unstructured(_) => (Vec::new(), 0),
		}
	}
}

/// Convert a dynamic object to a JSON tree. An object that cannot be represented is logged
/// and skipped.
fn into_unstructured(obj: DynamicObject) -> Option<ResourceObject> {
	let name = obj.metadata.name.clone().unwrap_or_default();
	match serde_json::to_value(obj) {
		Ok(value) => Some(ResourceObject::Unstructured(value)),
		Err(e) => {
			tracing::warn!(name, error = %e, "failed to convert listed object, skipping");
			None
		}
	}
}

fn remaining_items(metadata: &ListMeta) -> usize {
	metadata
		.remaining_item_count
		.and_then(|count| usize::try_from(count).ok())
		.unwrap_or(0)
}
