//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This provides a real HTTP server that can be used with actual kubeconfig-based
//! connections. It serves discovery and LIST requests; nothing it serves can be modified.

use std::sync::Arc;

use bon::Builder;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use serde_json::{json, Value};
use tracing::{debug, trace};
use wiremock::{
	matchers::{header_regex, method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::discovery::{DiscoveryMode, MockApiResource, MockDiscovery};

/// Seeded manifests keyed by the collection path they are listed under, in seeding order.
type SeededResources = Arc<Vec<(String, Value)>>;

/// An error response served instead of the normal response for one path.
#[derive(Debug, Clone)]
pub struct MockFailure {
	pub path: String,
	pub code: u16,
	pub message: String,
}

impl MockFailure {
	pub fn new(path: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			code,
			message: message.into(),
		}
	}
}

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	#[builder(default)]
	discovery_mode: DiscoveryMode,
	/// Resources to serve as raw manifests. The server derives API paths from
	/// apiVersion/kind using the discovery data. Lists return them in this order.
	#[builder(default)]
	resources: Vec<Value>,
	/// Paths that answer with an error status instead.
	#[builder(default)]
	failures: Vec<MockFailure>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		let discovery = Arc::new(MockDiscovery::default());

		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut resources: Vec<(String, Value)> = Vec::new();
		for manifest in self.resources {
			if let Some(api_path) = api_path_for_manifest(&manifest, &discovery) {
				trace!(api_path = %api_path, "Registered resource");
				resources.push((api_path, manifest));
			}
		}

		// Add default namespace if not present
		let has_default_namespace = resources.iter().any(|(api_path, manifest)| {
			api_path == "/api/v1/namespaces"
				&& manifest.pointer("/metadata/name") == Some(&json!("default"))
		});
		if !has_default_namespace {
			resources.push((
				"/api/v1/namespaces".to_string(),
				json!({
					"apiVersion": "v1",
					"kind": "Namespace",
					"metadata": {
						"name": "default"
					}
				}),
			));
		}

		mount_failures(&server, self.failures).await;
		mount_version(&server).await;
		mount_discovery(&server, &discovery, self.discovery_mode).await;
		mount_lists(&server, Arc::new(resources), discovery).await;

		RunningHttpMockK8sServer { server }
	}
}

/// Derive the collection path a manifest is listed under using discovery data.
fn api_path_for_manifest(manifest: &Value, discovery: &MockDiscovery) -> Option<String> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let namespace = manifest
		.pointer("/metadata/namespace")
		.and_then(Value::as_str);

	let resource = discovery
		.resources_for(api_version)?
		.iter()
		.find(|r| r.kind == kind)?;

	let prefix = if api_version.contains('/') {
		format!("/apis/{}", api_version)
	} else {
		format!("/api/{}", api_version)
	};

	let path = if resource.namespaced {
		let ns = namespace.unwrap_or("default");
		format!("{}/namespaces/{}/{}", prefix, ns, resource.name)
	} else {
		format!("{}/{}", prefix, resource.name)
	};

	Some(path)
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context", "default")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name and
	/// context namespace.
	pub fn kubeconfig_with_context(&self, context_name: &str, namespace: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some(namespace.to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}
}

fn status_body(code: u16, message: &str) -> Value {
	let reason = match code {
		403 => "Forbidden",
		404 => "NotFound",
		500 => "InternalError",
		_ => "Unknown",
	};
	json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}

async fn mount_failures(server: &MockServer, failures: Vec<MockFailure>) {
	// Failures take precedence over everything else mounted on the same path.
	for failure in failures {
		Mock::given(method("GET"))
			.and(path(failure.path.as_str()))
			.respond_with(
				ResponseTemplate::new(failure.code)
					.set_body_json(status_body(failure.code, &failure.message)),
			)
			.with_priority(1)
			.mount(server)
			.await;
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-08-13T00:00:00Z",
			"goVersion": "go1.22.5",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

async fn mount_discovery(server: &MockServer, discovery: &MockDiscovery, mode: DiscoveryMode) {
	let core_aggregated_resources: Vec<_> = discovery
		.core_resources
		.iter()
		.map(|r| {
			json!({
				"resource": r.name,
				"responseKind": {
					"group": "",
					"version": "v1",
					"kind": r.kind
				},
				"scope": if r.namespaced { "Namespaced" } else { "Cluster" },
				"verbs": r.verbs,
			})
		})
		.collect();

	let aggregated_core_body = json!({
		"kind": "APIGroupDiscoveryList",
		"apiVersion": "apidiscovery.k8s.io/v2",
		"items": [{
			"metadata": {
				"name": ""
			},
			"versions": [{
				"version": "v1",
				"resources": core_aggregated_resources,
				"freshness": "Current"
			}]
		}]
	});

	let aggregated_groups: Vec<_> = discovery
		.group_resources
		.iter()
		.map(|(gv, rs)| {
			let (group, version) = gv.split_once('/').unwrap_or(("", gv));
			let resources: Vec<_> = rs
				.iter()
				.map(|r| {
					json!({
						"resource": r.name,
						"responseKind": {
							"group": group,
							"version": version,
							"kind": r.kind
						},
						"scope": if r.namespaced { "Namespaced" } else { "Cluster" },
						"verbs": r.verbs,
					})
				})
				.collect();

			json!({
				"metadata": {
					"name": group
				},
				"versions": [{
					"version": version,
					"resources": resources,
					"freshness": "Current"
				}]
			})
		})
		.collect();

	let aggregated_apis_body = json!({
		"kind": "APIGroupDiscoveryList",
		"apiVersion": "apidiscovery.k8s.io/v2",
		"items": aggregated_groups
	});

	// The Content-Type must announce the aggregated format or clients won't parse it.
	const AGGREGATED_DISCOVERY_CONTENT_TYPE: &str =
		"application/json;g=apidiscovery.k8s.io;v=v2;as=APIGroupDiscoveryList";

	match mode {
		DiscoveryMode::Aggregated => {
			// set_body_json would overwrite the Content-Type
			let core_body = serde_json::to_vec(&aggregated_core_body)
				.expect("serializing discovery JSON should never fail");
			let apis_body = serde_json::to_vec(&aggregated_apis_body)
				.expect("serializing discovery JSON should never fail");

			Mock::given(method("GET"))
				.and(path("/api"))
				.and(header_regex("accept", "apidiscovery"))
				.respond_with(
					ResponseTemplate::new(200)
						.set_body_raw(core_body, AGGREGATED_DISCOVERY_CONTENT_TYPE),
				)
				.mount(server)
				.await;

			Mock::given(method("GET"))
				.and(path("/apis"))
				.and(header_regex("accept", "apidiscovery"))
				.respond_with(
					ResponseTemplate::new(200)
						.set_body_raw(apis_body, AGGREGATED_DISCOVERY_CONTENT_TYPE),
				)
				.mount(server)
				.await;
		}
		DiscoveryMode::Legacy => {
			Mock::given(method("GET"))
				.and(path("/api"))
				.and(header_regex("accept", "apidiscovery"))
				.respond_with(ResponseTemplate::new(406))
				.mount(server)
				.await;

			Mock::given(method("GET"))
				.and(path("/apis"))
				.and(header_regex("accept", "apidiscovery"))
				.respond_with(ResponseTemplate::new(406))
				.mount(server)
				.await;
		}
	}

	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIVersions",
			"versions": ["v1"],
			"serverAddressByClientCIDRs": []
		})))
		.mount(server)
		.await;

	let groups: Vec<_> = discovery
		.group_resources
		.keys()
		.map(|gv| {
			let (group, version) = gv.split_once('/').unwrap_or(("", gv));
			json!({
				"name": group,
				"versions": [{"groupVersion": gv, "version": version}],
				"preferredVersion": {"groupVersion": gv, "version": version}
			})
		})
		.collect();

	Mock::given(method("GET"))
		.and(path("/apis"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIGroupList",
			"apiVersion": "v1",
			"groups": groups
		})))
		.mount(server)
		.await;

	let resource_list = |gv: &str, rs: &[MockApiResource]| {
		let resources: Vec<_> = rs
			.iter()
			.map(|r| {
				json!({
					"name": r.name,
					"singularName": "",
					"namespaced": r.namespaced,
					"kind": r.kind,
					"verbs": r.verbs,
				})
			})
			.collect();
		json!({
			"kind": "APIResourceList",
			"apiVersion": "v1",
			"groupVersion": gv,
			"resources": resources
		})
	};

	Mock::given(method("GET"))
		.and(path("/api/v1"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(resource_list("v1", &discovery.core_resources)),
		)
		.mount(server)
		.await;

	for (gv, rs) in &discovery.group_resources {
		Mock::given(method("GET"))
			.and(path(format!("/apis/{}", gv)))
			.respond_with(ResponseTemplate::new(200).set_body_json(resource_list(gv, rs)))
			.mount(server)
			.await;
	}
}

async fn mount_lists(server: &MockServer, resources: SeededResources, discovery: Arc<MockDiscovery>) {
	// LIST requests against any collection path. Seeded manifests are returned in seeding
	// order; known but unseeded collections are empty; anything else is a 404.
	Mock::given(method("GET"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let path_str = req.url.path().trim_end_matches('/');

			if !is_known_collection(path_str, &discovery) {
				return ResponseTemplate::new(404).set_body_json(status_body(
					404,
					"the server could not find the requested resource",
				));
			}

			let items: Vec<_> = resources
				.iter()
				.filter(|(api_path, _)| api_path == path_str)
				.map(|(_, manifest)| manifest.clone())
				.collect();

			ResponseTemplate::new(200).set_body_json(json!({
				"kind": "List",
				"apiVersion": "v1",
				"metadata": {"resourceVersion": "1"},
				"items": items
			}))
		})
		.mount(server)
		.await;
}

/// Whether `path` names a collection the mock discovery data knows about.
///
/// Examples:
/// - `/api/v1/namespaces/default/configmaps` -> true
/// - `/apis/apps/v1/namespaces/default/deployments` -> true
/// - `/api/v1/namespaces` -> true
/// - `/apis/example.com/v1/namespaces/default/widgets` -> false
fn is_known_collection(path: &str, discovery: &MockDiscovery) -> bool {
	let (api_version, rest) = if let Some(rest) = path.strip_prefix("/api/v1/") {
		("v1".to_string(), rest)
	} else if let Some(rest) = path.strip_prefix("/apis/") {
		let mut parts = rest.splitn(3, '/');
		match (parts.next(), parts.next(), parts.next()) {
			(Some(group), Some(version), Some(rest)) => (format!("{}/{}", group, version), rest),
			_ => return false,
		}
	} else {
		return false;
	};

	let Some(resources) = discovery.resources_for(&api_version) else {
		return false;
	};

	let segments: Vec<&str> = rest.split('/').collect();
	match segments.as_slice() {
		[plural] => resources.iter().any(|r| r.name == *plural),
		["namespaces", _, plural] => resources.iter().any(|r| r.namespaced && r.name == *plural),
		_ => false,
	}
}
