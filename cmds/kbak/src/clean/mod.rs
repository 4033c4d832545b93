//! Manifest cleaning.
//!
//! A live object carries server-assigned state next to what the user declared. Cleaning strips
//! the former so the result can be applied to another cluster as-is:
//!
//! - metadata keeps `name`, `namespace` and `labels`; timestamps, versions, UIDs, managed
//!   fields, owner references, finalizers and system annotations go;
//! - `status` always goes;
//! - kind-specific spec fields assigned by controllers go (see the per-kind modules);
//! - loosely modeled objects get `apiVersion` and `kind` inferred when missing.
//!
//! Typed objects always serialize their canonical `apiVersion` and `kind`.

mod batch;
mod core_kinds;
mod metadata;
mod unstructured;
mod workload;

pub use metadata::{is_system_annotation, is_system_label, SYSTEM_ANNOTATION_PREFIXES};
pub use unstructured::infer_type;

use crate::k8s::object::ResourceObject;

/// Clean `obj` in place. Fields that are absent are skipped; cleaning never fails.
pub fn clean(obj: &mut ResourceObject) {
	use metadata::clean_object_meta;

	match obj {
		ResourceObject::Pod(pod) => workload::clean_pod(pod),
		ResourceObject::Deployment(deployment) => workload::clean_deployment(deployment),
		ResourceObject::StatefulSet(stateful_set) => workload::clean_stateful_set(stateful_set),
		ResourceObject::DaemonSet(daemon_set) => workload::clean_daemon_set(daemon_set),
		ResourceObject::ReplicaSet(replica_set) => workload::clean_replica_set(replica_set),
		ResourceObject::Job(job) => batch::clean_job(job),
		ResourceObject::CronJob(cron_job) => batch::clean_cron_job(cron_job),
		ResourceObject::Service(service) => core_kinds::clean_service(service),
		ResourceObject::PersistentVolumeClaim(claim) => {
			core_kinds::clean_persistent_volume_claim(claim);
		}
		ResourceObject::ServiceAccount(account) => core_kinds::clean_service_account(account),
		ResourceObject::Ingress(ingress) => {
			clean_object_meta(&mut ingress.metadata);
			ingress.status = None;
		}
		ResourceObject::PodDisruptionBudget(budget) => {
			clean_object_meta(&mut budget.metadata);
			budget.status = None;
		}
		ResourceObject::ConfigMap(config_map) => clean_object_meta(&mut config_map.metadata),
		ResourceObject::Secret(secret) => clean_object_meta(&mut secret.metadata),
		ResourceObject::Role(role) => clean_object_meta(&mut role.metadata),
		ResourceObject::ClusterRole(role) => clean_object_meta(&mut role.metadata),
		ResourceObject::RoleBinding(binding) => clean_object_meta(&mut binding.metadata),
		ResourceObject::ClusterRoleBinding(binding) => clean_object_meta(&mut binding.metadata),
		ResourceObject::Unstructured(value) => unstructured::clean_unstructured(value),
	}
}
