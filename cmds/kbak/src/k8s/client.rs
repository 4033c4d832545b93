//! Kubernetes cluster connection management.

use std::{path::Path, time::Duration};

use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error("failed to read kubeconfig {path}")]
	ReadKubeconfig {
		path: String,
		#[source]
		source: KubeconfigError,
	},

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// How to find the cluster.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
	/// Explicit kubeconfig file. Defaults to `$KUBECONFIG` or `~/.kube/config`.
	pub kubeconfig: Option<String>,
	/// Kubeconfig context to use instead of the current one.
	pub context: Option<String>,
}

/// Represents a connection to a Kubernetes cluster.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	server_version: Info,
	/// Human-readable identifier for the cluster (context name or `in-cluster`).
	cluster_identifier: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("cluster_identifier", &self.cluster_identifier)
			.field("server_version", &self.server_version)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect to the cluster.
	///
	/// Without an explicit kubeconfig or context the in-cluster service account configuration
	/// is tried first; otherwise, or when it is unavailable, the kubeconfig is used.
	#[instrument(skip_all)]
	pub async fn connect(options: &ConnectionOptions) -> Result<Self, ConnectionError> {
		if options.kubeconfig.is_none() && options.context.is_none() {
			match Config::incluster() {
				Ok(config) => {
					tracing::debug!("using in-cluster configuration");
					return Self::from_config(config, "in-cluster".to_string()).await;
				}
				Err(e) => tracing::debug!(error = %e, "in-cluster configuration not available"),
			}
		}

		let kubeconfig = match &options.kubeconfig {
			Some(path) => Kubeconfig::read_from(Path::new(path)).map_err(|source| {
				ConnectionError::ReadKubeconfig {
					path: path.clone(),
					source,
				}
			})?,
			None => Kubeconfig::read()?,
		};
		Self::from_kubeconfig(kubeconfig, options.context.as_deref()).await
	}

	/// Connect using a provided kubeconfig and optional context override.
	#[instrument(skip_all)]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		let context_name = match context {
			Some(name) => {
				if !kubeconfig.contexts.iter().any(|c| c.name == name) {
					return Err(ConnectionError::ContextNotFound(name.to_string()));
				}
				name.to_string()
			}
			None => kubeconfig.current_context.clone().unwrap_or_default(),
		};

		tracing::debug!(context = %context_name, "using kubeconfig context");

		let config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: context.map(ToString::to_string),
				..Default::default()
			},
		)
		.await?;

		Self::from_config(config, format!("context:{}", context_name)).await
	}

	async fn from_config(
		mut config: Config,
		cluster_identifier: String,
	) -> Result<Self, ConnectionError> {
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config)?;

		let server_version = client.apiserver_version().await?;
		tracing::debug!(
			cluster = %cluster_identifier,
			version = %server_version.git_version,
			"connected to cluster"
		);

		Ok(Self {
			client,
			server_version,
			cluster_identifier,
		})
	}

	/// Get a reference to the underlying kube client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Get the server version.
	pub fn server_version(&self) -> &Info {
		&self.server_version
	}

	/// Get the default namespace from the current context.
	pub fn default_namespace(&self) -> &str {
		self.client.default_namespace()
	}

	/// Get the cluster identifier (context name or `in-cluster`).
	pub fn cluster_identifier(&self) -> &str {
		&self.cluster_identifier
	}
}
