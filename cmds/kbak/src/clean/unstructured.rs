//! Cleaning of loosely modeled objects, including type inference for objects that arrive
//! without `apiVersion` or `kind`.

use serde_json::{Map, Value as JsonValue};

use super::metadata::clean_metadata_map;

/// Type assumed when nothing else identifies an object.
const FALLBACK_API_VERSION: &str = "v1";
const FALLBACK_KIND: &str = "Pod";

/// Name fragments that hint at a kind, tried in order. A rule matches when the lowercased
/// name contains any of `needles` and none of `excluded`.
struct NameRule {
	needles: &'static [&'static str],
	excluded: &'static [&'static str],
	api_version: &'static str,
	kind: &'static str,
}

const NAME_RULES: &[NameRule] = &[
	NameRule::new(&["deploy"], "apps/v1", "Deployment"),
	NameRule::new(&["svc", "service"], "v1", "Service"),
	NameRule::new(&["cm", "config"], "v1", "ConfigMap"),
	NameRule::new(&["secret"], "v1", "Secret"),
	NameRule::new(&["pod"], "v1", "Pod"),
	NameRule::new(&["cron"], "batch/v1", "CronJob"),
	NameRule::new(&["job"], "batch/v1", "Job"),
	NameRule::new(&["ing"], "networking.k8s.io/v1", "Ingress"),
	NameRule::new(&["role"], "rbac.authorization.k8s.io/v1", "Role").excluding(&["cluster"]),
	NameRule::new(&["binding"], "rbac.authorization.k8s.io/v1", "RoleBinding")
		.excluding(&["cluster"]),
	NameRule::new(&["sa", "serviceaccount"], "v1", "ServiceAccount"),
	NameRule::new(&["pvc", "claim"], "v1", "PersistentVolumeClaim"),
	NameRule::new(&["sts", "stateful"], "apps/v1", "StatefulSet"),
	NameRule::new(&["ds", "daemon"], "apps/v1", "DaemonSet"),
];

impl NameRule {
	const fn new(
		needles: &'static [&'static str],
		api_version: &'static str,
		kind: &'static str,
	) -> Self {
		Self {
			needles,
			excluded: &[],
			api_version,
			kind,
		}
	}

	const fn excluding(self, excluded: &'static [&'static str]) -> Self {
		Self { excluded, ..self }
	}

	fn matches(&self, name: &str) -> bool {
		self.needles.iter().any(|needle| name.contains(needle))
			&& !self.excluded.iter().any(|word| name.contains(word))
	}
}

/// apiVersion of a well-known kind.
fn api_version_for_kind(kind: &str) -> Option<&'static str> {
	Some(match kind {
		"Pod" | "Service" | "ConfigMap" | "Secret" | "ServiceAccount" | "PersistentVolumeClaim"
		| "Namespace" => "v1",
		"Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => "apps/v1",
		"Ingress" | "IngressClass" | "NetworkPolicy" => "networking.k8s.io/v1",
		"Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => {
			"rbac.authorization.k8s.io/v1"
		}
		"Job" | "CronJob" => "batch/v1",
		"HorizontalPodAutoscaler" => "autoscaling/v2",
		"PodDisruptionBudget" => "policy/v1",
		"CustomResourceDefinition" => "apiextensions.k8s.io/v1",
		_ => return None,
	})
}

/// Most common kind served under a well-known apiVersion.
fn common_kind_for_api_version(api_version: &str) -> Option<&'static str> {
	Some(match api_version {
		"v1" => "Pod",
		"apps/v1" => "Deployment",
		"batch/v1" => "Job",
		"networking.k8s.io/v1" => "Ingress",
		"rbac.authorization.k8s.io/v1" => "Role",
		_ => return None,
	})
}

/// Non-empty string field of a mapping.
fn str_field<'a>(obj: &'a Map<String, JsonValue>, key: &str) -> Option<&'a str> {
	obj.get(key)
		.and_then(JsonValue::as_str)
		.filter(|value| !value.is_empty())
}

fn set_str(obj: &mut Map<String, JsonValue>, key: &str, value: &str) {
	obj.insert(key.to_string(), JsonValue::String(value.to_string()));
}

/// Fill in a missing or empty `apiVersion` and `kind`.
///
/// Resolution goes from the most to the least reliable source: the kind's known group, the
/// version's most common kind, then fragments of `metadata.name`. Whatever is still missing
/// after that becomes `v1` / `Pod`. Fields that are already set are never overwritten.
pub fn infer_type(obj: &mut Map<String, JsonValue>) {
	let mut api_version = str_field(obj, "apiVersion").map(ToString::to_string);
	let mut kind = str_field(obj, "kind").map(ToString::to_string);

	if api_version.is_none() {
		if let Some(known) = kind.as_deref().and_then(api_version_for_kind) {
			api_version = Some(known.to_string());
		}
	}

	if kind.is_none() {
		if let Some(common) = api_version.as_deref().and_then(common_kind_for_api_version) {
			kind = Some(common.to_string());
		}
	}

	if api_version.is_none() && kind.is_none() {
		let name = obj
			.get("metadata")
			.and_then(|meta| meta.get("name"))
			.and_then(JsonValue::as_str)
			.map(str::to_lowercase)
			.unwrap_or_default();
		if !name.is_empty() {
			if let Some(rule) = NAME_RULES.iter().find(|rule| rule.matches(&name)) {
				api_version = Some(rule.api_version.to_string());
				kind = Some(rule.kind.to_string());
			}
		}
	}

	set_str(
		obj,
		"apiVersion",
		api_version.as_deref().unwrap_or(FALLBACK_API_VERSION),
	);
	set_str(obj, "kind", kind.as_deref().unwrap_or(FALLBACK_KIND));
}

/// Apply the generic rule to a loosely modeled object.
///
/// Values that are not mappings carry no fields to clean and are left alone.
pub(super) fn clean_unstructured(value: &mut JsonValue) {
	let Some(obj) = value.as_object_mut() else {
		return;
	};

	obj.remove("status");

	if str_field(obj, "apiVersion").is_none() || str_field(obj, "kind").is_none() {
		infer_type(obj);
	}

	if let Some(JsonValue::Object(meta)) = obj.get_mut("metadata") {
		clean_metadata_map(meta);
	}
}
