//! Integration tests for ClusterConnection using HTTP mock server.

use assert_matches::assert_matches;
use k8s_mock::{discovery::DiscoveryMode, http::HttpMockK8sServer};
use k8s_openapi::apimachinery::pkg::version::Info;
use kbak::k8s::client::{ClusterConnection, ConnectionError, ConnectionOptions};
use tempfile::TempDir;

fn mock_version() -> Info {
	Info {
		major: "1".to_string(),
		minor: "31".to_string(),
		git_version: "v1.31.0".to_string(),
		git_commit: "fake".to_string(),
		git_tree_state: "clean".to_string(),
		build_date: "2024-08-13T00:00:00Z".to_string(),
		go_version: "go1.22.5".to_string(),
		compiler: "gc".to_string(),
		platform: "linux/amd64".to_string(),
	}
}

async fn test_connect_impl(discovery_mode: DiscoveryMode) {
	let server = HttpMockK8sServer::builder()
		.discovery_mode(discovery_mode)
		.build()
		.start()
		.await;

	let conn = ClusterConnection::from_kubeconfig(server.kubeconfig(), None)
		.await
		.expect("connection should succeed");

	assert_eq!(*conn.server_version(), mock_version());
	assert_eq!(conn.cluster_identifier(), "context:mock-context");
	assert_eq!(conn.default_namespace(), "default");
}

#[tokio::test]
async fn test_connect_aggregated() {
	test_connect_impl(DiscoveryMode::Aggregated).await;
}

#[tokio::test]
async fn test_connect_legacy() {
	test_connect_impl(DiscoveryMode::Legacy).await;
}

#[tokio::test]
async fn test_context_namespace_is_default_namespace() {
	let server = HttpMockK8sServer::builder().build().start().await;

	let conn = ClusterConnection::from_kubeconfig(
		server.kubeconfig_with_context("staging-admin", "staging"),
		Some("staging-admin"),
	)
	.await
	.expect("connection should succeed");

	assert_eq!(conn.default_namespace(), "staging");
	assert_eq!(conn.cluster_identifier(), "context:staging-admin");
}

#[tokio::test]
async fn test_unknown_context() {
	let server = HttpMockK8sServer::builder().build().start().await;

	let result = ClusterConnection::from_kubeconfig(server.kubeconfig(), Some("prod-admin")).await;

	assert_matches!(result, Err(ConnectionError::ContextNotFound(name)) if name == "prod-admin");
}

#[tokio::test]
async fn test_connect_with_kubeconfig_file() {
	let server = HttpMockK8sServer::builder().build().start().await;
	let temp = TempDir::new().unwrap();
	let path = temp.path().join("config");
	std::fs::write(&path, serde_yaml::to_string(&server.kubeconfig()).unwrap()).unwrap();

	let conn = ClusterConnection::connect(&ConnectionOptions {
		kubeconfig: Some(path.to_string_lossy().into_owned()),
		context: None,
	})
	.await
	.expect("connection should succeed");

	assert_eq!(conn.server_version().git_version, "v1.31.0");
}
