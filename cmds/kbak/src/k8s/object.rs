//! Resource objects as they come back from the cluster.
//!
//! Kinds with a compiled `k8s-openapi` model are kept strongly typed; everything else is
//! carried as a JSON tree.

use k8s_openapi::api::{
	apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
	batch::v1::{CronJob, Job},
	core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Secret, Service, ServiceAccount},
	networking::v1::Ingress,
	policy::v1::PodDisruptionBudget,
	rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
};
use serde::Serialize;
use serde_json::Value as JsonValue;

macro_rules! resource_objects {
	($($variant:ident($ty:ty)),* $(,)?) => {
		/// A single resource instance, either strongly or loosely modeled.
		#[derive(Debug, Clone, Serialize)]
		#[serde(untagged)]
		pub enum ResourceObject {
			$($variant($ty),)*
			/// A kind without a compiled model.
			Unstructured(JsonValue),
		}

		$(
			impl From<$ty> for ResourceObject {
				fn from(value: $ty) -> Self {
					Self::$variant(value)
				}
			}
		)*

		impl ResourceObject {
			/// Declared `metadata.name`, or an empty string when there is none.
			pub fn name(&self) -> String {
				match self {
					$(Self::$variant(obj) => obj.metadata.name.clone().unwrap_or_default(),)*
					Self::Unstructured(value) => value
						.pointer("/metadata/name")
						.and_then(JsonValue::as_str)
						.unwrap_or_default()
						.to_string(),
				}
			}

			/// Kind of the object. Typed objects report their canonical kind.
			pub fn kind(&self) -> Option<&str> {
				match self {
					$(Self::$variant(_) => Some(<$ty as k8s_openapi::Resource>::KIND),)*
					Self::Unstructured(value) => value.get("kind").and_then(JsonValue::as_str),
				}
			}

			/// apiVersion of the object. Typed objects report their canonical version.
			pub fn api_version(&self) -> Option<&str> {
				match self {
					$(Self::$variant(_) => Some(<$ty as k8s_openapi::Resource>::API_VERSION),)*
					Self::Unstructured(value) => value.get("apiVersion").and_then(JsonValue::as_str),
				}
			}
		}
	};
}

resource_objects! {
	Pod(Pod),
	Deployment(Deployment),
	StatefulSet(StatefulSet),
	DaemonSet(DaemonSet),
	ReplicaSet(ReplicaSet),
	Job(Job),
	CronJob(CronJob),
	Ingress(Ingress),
	PodDisruptionBudget(PodDisruptionBudget),
	Role(Role),
	ClusterRole(ClusterRole),
	RoleBinding(RoleBinding),
	ClusterRoleBinding(ClusterRoleBinding),
	Service(Service),
	ConfigMap(ConfigMap),
	Secret(Secret),
	PersistentVolumeClaim(PersistentVolumeClaim),
	ServiceAccount(ServiceAccount),
}

impl From<JsonValue> for ResourceObject {
	fn from(value: JsonValue) -> Self {
		Self::Unstructured(value)
	}
}

impl ResourceObject {
	/// Whether this is a null or empty placeholder rather than an actual resource.
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Unstructured(JsonValue::Null) => true,
			Self::Unstructured(JsonValue::Object(map)) => map.is_empty(),
			_ => false,
		}
	}
}
