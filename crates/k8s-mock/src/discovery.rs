//! Mock Kubernetes API discovery types.

use std::collections::HashMap;

/// Discovery mode for the mock server.
#[derive(Clone, Copy, Default)]
pub enum DiscoveryMode {
	/// Support aggregated discovery (APIGroupDiscoveryList).
	#[default]
	Aggregated,
	/// Return 406 for aggregated discovery, forcing fallback to legacy endpoints.
	Legacy,
}

/// Pre-configured discovery responses.
pub struct MockDiscovery {
	pub core_resources: Vec<MockApiResource>,
	pub group_resources: HashMap<String, Vec<MockApiResource>>,
}

impl MockDiscovery {
	/// Resources served under an apiVersion (`v1` for the core group).
	pub fn resources_for(&self, api_version: &str) -> Option<&[MockApiResource]> {
		if api_version == "v1" {
			Some(&self.core_resources)
		} else {
			self.group_resources.get(api_version).map(Vec::as_slice)
		}
	}
}

impl Default for MockDiscovery {
	fn default() -> Self {
		Self {
			core_resources: vec![
				MockApiResource::namespaced("pods", "Pod"),
				MockApiResource::namespaced("services", "Service"),
				MockApiResource::namespaced("configmaps", "ConfigMap"),
				MockApiResource::namespaced("secrets", "Secret"),
				MockApiResource::namespaced("persistentvolumeclaims", "PersistentVolumeClaim"),
				MockApiResource::namespaced("serviceaccounts", "ServiceAccount"),
				MockApiResource::cluster_scoped("namespaces", "Namespace"),
			],
			group_resources: HashMap::from([
				(
					"apps/v1".to_string(),
					vec![
						MockApiResource::namespaced("deployments", "Deployment"),
						MockApiResource::namespaced("statefulsets", "StatefulSet"),
						MockApiResource::namespaced("daemonsets", "DaemonSet"),
						MockApiResource::namespaced("replicasets", "ReplicaSet"),
					],
				),
				(
					"batch/v1".to_string(),
					vec![
						MockApiResource::namespaced("jobs", "Job"),
						MockApiResource::namespaced("cronjobs", "CronJob"),
					],
				),
				(
					"networking.k8s.io/v1".to_string(),
					vec![MockApiResource::namespaced("ingresses", "Ingress")],
				),
				(
					"rbac.authorization.k8s.io/v1".to_string(),
					vec![
						MockApiResource::namespaced("roles", "Role"),
						MockApiResource::namespaced("rolebindings", "RoleBinding"),
						MockApiResource::cluster_scoped("clusterroles", "ClusterRole"),
						MockApiResource::cluster_scoped("clusterrolebindings", "ClusterRoleBinding"),
					],
				),
				(
					"policy/v1".to_string(),
					vec![MockApiResource::namespaced(
						"poddisruptionbudgets",
						"PodDisruptionBudget",
					)],
				),
				(
					"autoscaling/v2".to_string(),
					vec![MockApiResource::namespaced(
						"horizontalpodautoscalers",
						"HorizontalPodAutoscaler",
					)],
				),
			]),
		}
	}
}

/// A mock API resource definition.
pub struct MockApiResource {
	pub name: String,
	pub kind: String,
	pub namespaced: bool,
	pub verbs: Vec<String>,
}

impl MockApiResource {
	pub fn namespaced(name: &str, kind: &str) -> Self {
		Self::new(name, kind, true)
	}

	pub fn cluster_scoped(name: &str, kind: &str) -> Self {
		Self::new(name, kind, false)
	}

	fn new(name: &str, kind: &str, namespaced: bool) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced,
			verbs: vec!["get".into(), "list".into(), "watch".into()],
		}
	}
}
