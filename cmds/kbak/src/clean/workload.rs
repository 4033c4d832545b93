//! Pods and the controllers that own a pod template.

use k8s_openapi::{
	api::{
		apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
		core::v1::{Pod, PodTemplateSpec},
	},
	apimachinery::pkg::apis::meta::v1::LabelSelector,
};

use super::metadata::{clean_object_meta, clean_template_meta};

/// Service account every pod runs as when none is set.
const DEFAULT_SERVICE_ACCOUNT: &str = "default";

pub(super) fn clean_pod(pod: &mut Pod) {
	clean_object_meta(&mut pod.metadata);
	pod.status = None;

	if let Some(spec) = &mut pod.spec {
		spec.node_name = None;
		spec.service_account = None;
		if spec.service_account_name.as_deref() == Some(DEFAULT_SERVICE_ACCOUNT) {
			spec.service_account_name = None;
		}
	}
}

pub(super) fn clean_deployment(deployment: &mut Deployment) {
	clean_object_meta(&mut deployment.metadata);
	deployment.status = None;
	if let Some(spec) = &mut deployment.spec {
		clean_pod_template(&mut spec.template, &mut spec.selector);
	}
}

pub(super) fn clean_stateful_set(stateful_set: &mut StatefulSet) {
	clean_object_meta(&mut stateful_set.metadata);
	stateful_set.status = None;
	if let Some(spec) = &mut stateful_set.spec {
		clean_pod_template(&mut spec.template, &mut spec.selector);
	}
}

pub(super) fn clean_daemon_set(daemon_set: &mut DaemonSet) {
	clean_object_meta(&mut daemon_set.metadata);
	daemon_set.status = None;
	if let Some(spec) = &mut daemon_set.spec {
		clean_pod_template(&mut spec.template, &mut spec.selector);
	}
}

pub(super) fn clean_replica_set(replica_set: &mut ReplicaSet) {
	clean_object_meta(&mut replica_set.metadata);
	replica_set.status = None;
	if let Some(spec) = &mut replica_set.spec {
		if let Some(template) = &mut spec.template {
			clean_pod_template(template, &mut spec.selector);
		}
	}
}

/// Clean the template metadata and make sure the selector matches the template.
fn clean_pod_template(template: &mut PodTemplateSpec, selector: &mut LabelSelector) {
	clean_template_meta(&mut template.metadata, false);

	let has_match_labels = selector
		.match_labels
		.as_ref()
		.is_some_and(|labels| !labels.is_empty());
	if has_match_labels {
		return;
	}

	let template_labels = template
		.metadata
		.as_ref()
		.and_then(|meta| meta.labels.as_ref())
		.filter(|labels| !labels.is_empty());
	if let Some(labels) = template_labels {
		selector.match_labels = Some(labels.clone());
	}
}
