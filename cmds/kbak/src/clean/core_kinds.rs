//! Core group kinds with server-assigned spec fields.

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service, ServiceAccount};

use super::metadata::clean_object_meta;

/// `clusterIP` of a headless service.
const HEADLESS_CLUSTER_IP: &str = "None";

const DEFAULT_EXTERNAL_TRAFFIC_POLICY: &str = "Cluster";
const DEFAULT_SESSION_AFFINITY: &str = "None";

pub(super) fn clean_service(service: &mut Service) {
	clean_object_meta(&mut service.metadata);
	service.status = None;

	let Some(spec) = &mut service.spec else {
		return;
	};

	if spec.cluster_ip.as_deref() != Some(HEADLESS_CLUSTER_IP) {
		spec.cluster_ip = None;
	}
	spec.cluster_ips = None;
	spec.external_ips = None;
	spec.load_balancer_ip = None;
	spec.load_balancer_source_ranges = None;
	spec.health_check_node_port = None;

	if spec.external_traffic_policy.as_deref() == Some(DEFAULT_EXTERNAL_TRAFFIC_POLICY) {
		spec.external_traffic_policy = None;
	}
	if spec.session_affinity.as_deref() == Some(DEFAULT_SESSION_AFFINITY) {
		spec.session_affinity = None;
		spec.session_affinity_config = None;
	}
}

pub(super) fn clean_persistent_volume_claim(claim: &mut PersistentVolumeClaim) {
	clean_object_meta(&mut claim.metadata);
	claim.status = None;
}

pub(super) fn clean_service_account(account: &mut ServiceAccount) {
	clean_object_meta(&mut account.metadata);
	account.secrets = None;
	account.image_pull_secrets = None;
}

#[cfg(test)]
mod tests {
	use k8s_openapi::api::core::v1::{
		ClientIPConfig, LocalObjectReference, ObjectReference, PersistentVolumeClaimSpec,
		PersistentVolumeClaimStatus, ServiceSpec, SessionAffinityConfig,
	};
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn service(spec: ServiceSpec) -> Service {
		Service {
			spec: Some(spec),
			..Default::default()
		}
	}

	#[test]
	fn test_headless_service_keeps_cluster_ip() {
		let mut svc = service(ServiceSpec {
			cluster_ip: Some("None".to_string()),
			cluster_ips: Some(vec!["None".to_string()]),
			..Default::default()
		});
		clean_service(&mut svc);
		let spec = svc.spec.unwrap();
		assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
		assert!(spec.cluster_ips.is_none());
	}

	#[test]
	fn test_service_assigned_fields_cleared() {
		let mut svc = service(ServiceSpec {
			cluster_ip: Some("10.0.0.12".to_string()),
			cluster_ips: Some(vec!["10.0.0.12".to_string()]),
			external_ips: Some(vec!["203.0.113.7".to_string()]),
			load_balancer_ip: Some("203.0.113.8".to_string()),
			load_balancer_source_ranges: Some(vec!["10.0.0.0/8".to_string()]),
			health_check_node_port: Some(31000),
			type_: Some("LoadBalancer".to_string()),
			..Default::default()
		});
		clean_service(&mut svc);
		let spec = svc.spec.unwrap();
		assert!(spec.cluster_ip.is_none());
		assert!(spec.cluster_ips.is_none());
		assert!(spec.external_ips.is_none());
		assert!(spec.load_balancer_ip.is_none());
		assert!(spec.load_balancer_source_ranges.is_none());
		assert!(spec.health_check_node_port.is_none());
		assert_eq!(spec.type_.as_deref(), Some("LoadBalancer"));
	}

	#[rstest]
	#[case::default("Cluster", None)]
	#[case::local("Local", Some("Local"))]
	fn test_external_traffic_policy(#[case] policy: &str, #[case] expected: Option<&str>) {
		let mut svc = service(ServiceSpec {
			external_traffic_policy: Some(policy.to_string()),
			..Default::default()
		});
		clean_service(&mut svc);
		assert_eq!(svc.spec.unwrap().external_traffic_policy.as_deref(), expected);
	}

	#[test]
	fn test_default_session_affinity_cleared() {
		let mut svc = service(ServiceSpec {
			session_affinity: Some("None".to_string()),
			session_affinity_config: Some(SessionAffinityConfig::default()),
			..Default::default()
		});
		clean_service(&mut svc);
		let spec = svc.spec.unwrap();
		assert!(spec.session_affinity.is_none());
		assert!(spec.session_affinity_config.is_none());
	}

	#[test]
	fn test_client_ip_session_affinity_kept() {
		let config = SessionAffinityConfig {
			client_ip: Some(ClientIPConfig {
				timeout_seconds: Some(600),
			}),
		};
		let mut svc = service(ServiceSpec {
			session_affinity: Some("ClientIP".to_string()),
			session_affinity_config: Some(config.clone()),
			..Default::default()
		});
		clean_service(&mut svc);
		let spec = svc.spec.unwrap();
		assert_eq!(spec.session_affinity.as_deref(), Some("ClientIP"));
		assert_eq!(spec.session_affinity_config, Some(config));
	}

	#[test]
	fn test_persistent_volume_claim_spec_untouched() {
		let spec = PersistentVolumeClaimSpec {
			access_modes: Some(vec!["ReadWriteOnce".to_string()]),
			storage_class_name: Some("fast".to_string()),
			volume_name: Some("pv-1".to_string()),
			..Default::default()
		};
		let mut claim = PersistentVolumeClaim {
			spec: Some(spec.clone()),
			status: Some(PersistentVolumeClaimStatus {
				phase: Some("Bound".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		clean_persistent_volume_claim(&mut claim);
		assert!(claim.status.is_none());
		assert_eq!(claim.spec, Some(spec));
	}

	#[test]
	fn test_service_account_references_cleared() {
		let mut account = ServiceAccount {
			automount_service_account_token: Some(false),
			secrets: Some(vec![ObjectReference {
				name: Some("builder-token".to_string()),
				..Default::default()
			}]),
			image_pull_secrets: Some(vec![
				serde_json::from_value::<LocalObjectReference>(json!({"name": "registry"})).unwrap(),
			]),
			..Default::default()
		};
		clean_service_account(&mut account);
		assert!(account.secrets.is_none());
		assert!(account.image_pull_secrets.is_none());
		assert_eq!(account.automount_service_account_token, Some(false));
	}
}
