//! Object metadata rules shared by every kind.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Map, Value as JsonValue};

/// Annotation key prefixes owned by the platform and its controllers.
pub const SYSTEM_ANNOTATION_PREFIXES: [&str; 8] = [
	"kubernetes.io/",
	"k8s.io/",
	"control-plane.alpha.kubernetes.io/",
	"app.kubernetes.io/",
	"cni.projectcalico.org/",
	"kubectl.kubernetes.io/",
	"deployment.kubernetes.io/",
	"meta.helm.sh/",
];

/// Label key prefixes the job controller stamps on jobs and their pods.
const SYSTEM_LABEL_PREFIXES: [&str; 1] = ["batch.kubernetes.io/"];

/// Label keys the job controller stamps on jobs and their pods.
const SYSTEM_LABELS: [&str; 1] = ["controller-uid"];

/// Metadata keys that only describe server-side state.
const SERVER_METADATA_KEYS: [&str; 10] = [
	"creationTimestamp",
	"deletionTimestamp",
	"deletionGracePeriodSeconds",
	"generation",
	"resourceVersion",
	"selfLink",
	"uid",
	"managedFields",
	"ownerReferences",
	"finalizers",
];

/// Whether an annotation key is managed by the platform rather than the user.
pub fn is_system_annotation(key: &str) -> bool {
	SYSTEM_ANNOTATION_PREFIXES
		.iter()
		.any(|prefix| key.starts_with(prefix))
}

/// Whether a job or job-template label key is managed by the job controller.
pub fn is_system_label(key: &str) -> bool {
	SYSTEM_LABEL_PREFIXES
		.iter()
		.any(|prefix| key.starts_with(prefix))
		|| SYSTEM_LABELS.contains(&key)
}

/// Apply the common metadata rule: keep name, namespace and labels, drop server state and
/// system annotations.
pub(super) fn clean_object_meta(meta: &mut ObjectMeta) {
	meta.creation_timestamp = None;
	meta.deletion_timestamp = None;
	meta.deletion_grace_period_seconds = None;
	meta.generation = None;
	meta.resource_version = None;
	meta.self_link = None;
	meta.uid = None;
	meta.managed_fields = None;
	meta.owner_references = None;
	meta.finalizers = None;
	remove_keys(&mut meta.annotations, is_system_annotation);
}

/// Drop job controller labels.
pub(super) fn clean_job_labels(meta: &mut ObjectMeta) {
	remove_keys(&mut meta.labels, is_system_label);
}

/// Clean an optional nested metadata block, as found on templates.
pub(super) fn clean_template_meta(meta: &mut Option<ObjectMeta>, job_labels: bool) {
	if let Some(meta) = meta {
		clean_object_meta(meta);
		if job_labels {
			clean_job_labels(meta);
		}
	}
}

/// Apply the common metadata rule to a loosely modeled `metadata` mapping.
pub(super) fn clean_metadata_map(meta: &mut Map<String, JsonValue>) {
	for key in SERVER_METADATA_KEYS {
		meta.remove(key);
	}

	let empty = match meta.get_mut("annotations") {
		Some(JsonValue::Object(annotations)) => {
			annotations.retain(|key, _| !is_system_annotation(key));
			annotations.is_empty()
		}
		Some(JsonValue::Null) => true,
		_ => false,
	};
	if empty {
		meta.remove("annotations");
	}
}

/// Remove matching keys, collapsing a map emptied this way to absent.
fn remove_keys(map: &mut Option<BTreeMap<String, String>>, matches: impl Fn(&str) -> bool) {
	if let Some(entries) = map {
		entries.retain(|key, _| !matches(key));
		if entries.is_empty() {
			*map = None;
		}
	}
}

#[cfg(test)]
mod tests {
	use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn string_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
		entries
			.iter()
			.map(|(k, v)| ((*k).to_string(), (*v).to_string()))
			.collect()
	}

	#[rstest]
	#[case("kubernetes.io/change-cause", true)]
	#[case("kubectl.kubernetes.io/last-applied-configuration", true)]
	#[case("deployment.kubernetes.io/revision", true)]
	#[case("meta.helm.sh/release-name", true)]
	#[case("cni.projectcalico.org/podIP", true)]
	#[case("app.kubernetes.io/managed-by", true)]
	#[case("example.com/owner", false)]
	#[case("team", false)]
	#[case("Kubernetes.io/upper", false)]
	#[case("my.kubernetes.io/thing", false)]
	fn test_is_system_annotation(#[case] key: &str, #[case] expected: bool) {
		assert_eq!(is_system_annotation(key), expected);
	}

	#[rstest]
	#[case("controller-uid", true)]
	#[case("batch.kubernetes.io/job-name", true)]
	#[case("batch.kubernetes.io/controller-uid", true)]
	#[case("job-name", false)]
	#[case("controller-uid-extra", false)]
	#[case("app", false)]
	fn test_is_system_label(#[case] key: &str, #[case] expected: bool) {
		assert_eq!(is_system_label(key), expected);
	}

	#[test]
	fn test_clean_object_meta() {
		let mut meta = ObjectMeta {
			name: Some("web".to_string()),
			namespace: Some("prod".to_string()),
			labels: Some(string_map(&[("app", "web"), ("controller-uid", "abc")])),
			annotations: Some(string_map(&[
				("kubectl.kubernetes.io/last-applied-configuration", "{}"),
				("team", "payments"),
			])),
			creation_timestamp: Some(Time(Default::default())),
			generation: Some(4),
			resource_version: Some("123".to_string()),
			self_link: Some("/api/v1/namespaces/prod/pods/web".to_string()),
			uid: Some("uid-1".to_string()),
			deletion_grace_period_seconds: Some(30),
			finalizers: Some(vec!["example.com/protect".to_string()]),
			owner_references: Some(vec![OwnerReference {
				api_version: "apps/v1".to_string(),
				kind: "ReplicaSet".to_string(),
				name: "web-abc".to_string(),
				uid: "uid-0".to_string(),
				..Default::default()
			}]),
			..Default::default()
		};

		clean_object_meta(&mut meta);

		assert_eq!(meta.name.as_deref(), Some("web"));
		assert_eq!(meta.namespace.as_deref(), Some("prod"));
		// Labels are only filtered on jobs.
		assert_eq!(
			meta.labels,
			Some(string_map(&[("app", "web"), ("controller-uid", "abc")]))
		);
		assert_eq!(meta.annotations, Some(string_map(&[("team", "payments")])));
		assert!(meta.creation_timestamp.is_none());
		assert!(meta.generation.is_none());
		assert!(meta.resource_version.is_none());
		assert!(meta.self_link.is_none());
		assert!(meta.uid.is_none());
		assert!(meta.deletion_grace_period_seconds.is_none());
		assert!(meta.finalizers.is_none());
		assert!(meta.owner_references.is_none());
	}

	#[test]
	fn test_emptied_annotations_become_absent() {
		let mut meta = ObjectMeta {
			annotations: Some(string_map(&[("deployment.kubernetes.io/revision", "3")])),
			..Default::default()
		};
		clean_object_meta(&mut meta);
		assert!(meta.annotations.is_none());
	}

	#[test]
	fn test_clean_job_labels() {
		let mut meta = ObjectMeta {
			labels: Some(string_map(&[
				("controller-uid", "abc"),
				("batch.kubernetes.io/job-name", "backup"),
				("app", "backup"),
			])),
			..Default::default()
		};
		clean_job_labels(&mut meta);
		assert_eq!(meta.labels, Some(string_map(&[("app", "backup")])));

		let mut meta = ObjectMeta {
			labels: Some(string_map(&[("controller-uid", "abc")])),
			..Default::default()
		};
		clean_job_labels(&mut meta);
		assert!(meta.labels.is_none());
	}

	#[test]
	fn test_clean_metadata_map() {
		let mut value = json!({
			"name": "widget",
			"namespace": "prod",
			"labels": {"app": "widget"},
			"annotations": {
				"meta.helm.sh/release-name": "widgets",
				"example.com/owner": "team-a"
			},
			"uid": "u",
			"resourceVersion": "9",
			"creationTimestamp": "2024-01-01T00:00:00Z",
			"managedFields": [{"manager": "kubectl"}],
			"ownerReferences": [],
			"finalizers": ["x"],
			"generation": 2,
		});
		clean_metadata_map(value.as_object_mut().unwrap());
		assert_eq!(
			value,
			json!({
				"name": "widget",
				"namespace": "prod",
				"labels": {"app": "widget"},
				"annotations": {"example.com/owner": "team-a"},
			})
		);
	}

	#[rstest]
	#[case::all_system(json!({"kubernetes.io/description": "x"}))]
	#[case::already_empty(json!({}))]
	#[case::null(json!(null))]
	fn test_clean_metadata_map_drops_empty_annotations(#[case] annotations: JsonValue) {
		let mut value = json!({"name": "widget", "annotations": annotations});
		clean_metadata_map(value.as_object_mut().unwrap());
		assert_eq!(value, json!({"name": "widget"}));
	}
}
