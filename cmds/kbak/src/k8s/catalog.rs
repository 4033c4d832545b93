//! Registry of the resource kinds a backup can cover.
//!
//! The built-in kinds have compiled models and are listed through the typed API. Extra kinds are
//! given as apiVersion/kind pairs, resolved through API discovery and listed as dynamic objects.

use std::{borrow::Cow, collections::BTreeSet, fmt};

use k8s_openapi::{
	api::{
		apps::v1::{DaemonSet, Deployment, StatefulSet},
		batch::v1::{CronJob, Job},
		core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Secret, Service, ServiceAccount},
		networking::v1::Ingress,
		rbac::v1::{Role, RoleBinding},
	},
	NamespaceResourceScope,
};
use kube::{
	api::{Api, DynamicObject, ListParams, TypeMeta},
	core::GroupVersionKind,
	discovery::{oneshot::pinned_kind, Scope},
	Client, Resource,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use super::{list::ListResult, object::ResourceObject};

/// Error texts that mean the cluster does not serve a kind at all.
const NOT_SUPPORTED_MESSAGES: [&str; 4] = [
	"not found",
	"the server could not find the requested resource",
	"no matches for kind",
	"the server doesn't have a resource type",
];

/// Errors returned when listing one kind in one namespace.
#[derive(Debug, Error)]
pub enum ListError {
	#[error(transparent)]
	Api(#[from] kube::Error),

	#[error("no matches for kind \"{kind}\" in version \"{api_version}\"")]
	NoMatchesForKind { api_version: String, kind: String },

	#[error("{kind} in version \"{api_version}\" is cluster-scoped and cannot be listed per namespace")]
	ClusterScoped { api_version: String, kind: String },
}

impl ListError {
	/// Whether the error means the cluster does not serve this kind, as opposed to a failure
	/// while listing a kind it does serve.
	pub fn is_kind_not_supported(&self) -> bool {
		match self {
			Self::NoMatchesForKind { .. } => true,
			Self::ClusterScoped { .. } => false,
			Self::Api(kube::Error::Api(err)) => {
				is_not_found_message(&err.message) || is_not_found_message(&self.to_string())
			}
			Self::Api(_) => is_not_found_message(&self.to_string()),
		}
	}
}

/// Case-insensitive match of an error text against the "kind not served" messages.
pub fn is_not_found_message(message: &str) -> bool {
	let message = message.to_lowercase();
	NOT_SUPPORTED_MESSAGES
		.iter()
		.any(|needle| message.contains(needle))
}

macro_rules! builtin_kinds {
	($($variant:ident($ty:ty)),* $(,)?) => {
		/// A kind the backup can list, with the fetch operation bound to it.
		#[derive(Debug, Clone, PartialEq, Eq)]
		pub enum ResourceKind {
			$($variant,)*
			/// A kind without a compiled model, resolved through discovery.
			Dynamic(GroupVersionKind),
		}

		/// Built-in kinds in backup order.
		const BUILTIN_KINDS: &[ResourceKind] = &[$(ResourceKind::$variant,)*];

		impl ResourceKind {
			/// Kind name as served by the API.
			pub fn name(&self) -> &str {
				match self {
					$(Self::$variant => stringify!($variant),)*
					Self::Dynamic(gvk) => &gvk.kind,
				}
			}

			/// Directory name of this kind's manifests, also the key of its counters.
			///
			/// A discovered kind sharing its name with a built-in kind is qualified with its
			/// group (or its version for the core group), e.g. `Pod.example.com`.
			pub fn directory(&self) -> Cow<'_, str> {
				match self {
					Self::Dynamic(gvk) if is_builtin_name(&gvk.kind) => {
						let qualifier = if gvk.group.is_empty() { &gvk.version } else { &gvk.group };
						Cow::Owned(format!("{}.{qualifier}", gvk.kind))
					}
					kind => Cow::Borrowed(kind.name()),
				}
			}

			/// List every instance of this kind in `namespace`.
			#[instrument(skip_all, fields(kind = %self, namespace = %namespace))]
			pub async fn list(&self, client: &Client, namespace: &str) -> Result<ListResult, ListError> {
				match self {
					$(Self::$variant => list_typed::<$ty>(client, namespace).await,)*
					Self::Dynamic(gvk) => list_dynamic(client, namespace, gvk).await,
				}
			}
		}
	};
}

builtin_kinds! {
	Pod(Pod),
	Deployment(Deployment),
	Service(Service),
	ConfigMap(ConfigMap),
	Secret(Secret),
	PersistentVolumeClaim(PersistentVolumeClaim),
	ServiceAccount(ServiceAccount),
	StatefulSet(StatefulSet),
	DaemonSet(DaemonSet),
	Ingress(Ingress),
	Role(Role),
	RoleBinding(RoleBinding),
	CronJob(CronJob),
	Job(Job),
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Dynamic(gvk) => write!(f, "{}/{}", gvk.api_version(), gvk.kind),
			builtin => f.write_str(builtin.name()),
		}
	}
}

async fn list_typed<K>(client: &Client, namespace: &str) -> Result<ListResult, ListError>
where
	K: Resource<Scope = NamespaceResourceScope>
		+ Clone
		+ DeserializeOwned
		+ fmt::Debug
		+ Into<ResourceObject>,
	K::DynamicType: Default,
{
	let api: Api<K> = Api::namespaced(client.clone(), namespace);
	let list = api.list(&ListParams::default()).await?;
	Ok(list.into())
}

async fn list_dynamic(
	client: &Client,
	namespace: &str,
	gvk: &GroupVersionKind,
) -> Result<ListResult, ListError> {
	let no_matches = || ListError::NoMatchesForKind {
		api_version: gvk.api_version(),
		kind: gvk.kind.clone(),
	};

	let (resource, capabilities) = match pinned_kind(client, gvk).await {
		Ok(found) => found,
		Err(kube::Error::Api(ref err)) if err.code == 404 => return Err(no_matches()),
		Err(kube::Error::Discovery(_)) => return Err(no_matches()),
		Err(e) => return Err(e.into()),
	};

	if matches!(capabilities.scope, Scope::Cluster) {
		return Err(ListError::ClusterScoped {
			api_version: gvk.api_version(),
			kind: gvk.kind.clone(),
		});
	}

	let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &resource);
	let mut list = api.list(&ListParams::default()).await?;

	// List items usually come back without their type.
	for item in &mut list.items {
		let missing = item
			.types
			.as_ref()
			.is_none_or(|types| types.api_version.is_empty() || types.kind.is_empty());
		if missing {
			item.types = Some(TypeMeta {
				api_version: resource.api_version.clone(),
				kind: resource.kind.clone(),
			});
		}
	}

	Ok(ListResult::Dynamic(list))
}

/// Parse an `<apiVersion>/<Kind>` reference, e.g. `autoscaling/v2/HorizontalPodAutoscaler`
/// or `v1/Endpoints`.
pub fn parse_kind_reference(reference: &str) -> Option<GroupVersionKind> {
	let (api_version, kind) = reference.rsplit_once('/')?;
	gvk_from_api_version(api_version, kind)
}

/// Build a GroupVersionKind from an apiVersion string and a kind.
pub fn gvk_from_api_version(api_version: &str, kind: &str) -> Option<GroupVersionKind> {
	if api_version.is_empty() || kind.is_empty() {
		return None;
	}
	let (group, version) = match api_version.split_once('/') {
		Some((group, version)) if !group.is_empty() && !version.is_empty() => (group, version),
		Some(_) => return None,
		None => ("", api_version),
	};
	Some(GroupVersionKind::gvk(group, version, kind))
}

/// The built-in kinds plus any extra kinds configured for this run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
	extra_kinds: Vec<GroupVersionKind>,
}

impl Catalog {
	/// A catalog listing `extra` after the built-in kinds, in the given order.
	///
	/// Extra kinds that duplicate a built-in or an earlier extra kind are dropped, as are extra
	/// kinds whose manifests would land in the directory of an earlier extra kind.
	pub fn with_extra_kinds(extra: impl IntoIterator<Item = GroupVersionKind>) -> Self {
		let mut accepted: Vec<ResourceKind> = Vec::new();
		for gvk in extra {
			let builtin = BUILTIN_KINDS.iter().any(|kind| {
				kind.name() == gvk.kind && builtin_api_version(kind) == Some(gvk.api_version())
			});
			let kind = ResourceKind::Dynamic(gvk);
			if builtin || accepted.contains(&kind) {
				continue;
			}

			let clash = accepted
				.iter()
				.find(|earlier| earlier.directory() == kind.directory());
			if let Some(earlier) = clash {
				tracing::warn!(
					kind = %kind,
					earlier = %earlier,
					directory = %kind.directory(),
					"extra kind shares its output directory with an earlier extra kind, skipping"
				);
				continue;
			}
			accepted.push(kind);
		}

		let extra_kinds = accepted
			.into_iter()
			.filter_map(|kind| match kind {
				ResourceKind::Dynamic(gvk) => Some(gvk),
				_ => None,
			})
			.collect();
		Self { extra_kinds }
	}

	/// Every kind, in backup order.
	pub fn all_kinds(&self) -> Vec<ResourceKind> {
		BUILTIN_KINDS
			.iter()
			.cloned()
			.chain(self.extra_kinds.iter().cloned().map(ResourceKind::Dynamic))
			.collect()
	}

	/// Built-in kinds whose lowercased name is in `filter`, followed by every extra kind.
	///
	/// An empty filter selects every kind. Names that match no built-in kind are ignored.
	pub fn selected_kinds(&self, filter: &BTreeSet<String>) -> Vec<ResourceKind> {
		let kinds = self.all_kinds();
		if filter.is_empty() {
			return kinds;
		}
		kinds
			.into_iter()
			.filter(|kind| match kind {
				ResourceKind::Dynamic(_) => true,
				builtin => filter.contains(&builtin.name().to_lowercase()),
			})
			.collect()
	}

	/// Extra kinds configured for this catalog.
	pub fn extra_kinds(&self) -> &[GroupVersionKind] {
		&self.extra_kinds
	}
}

/// The built-in kinds, in backup order.
pub fn all_kinds() -> Vec<ResourceKind> {
	Catalog::default().all_kinds()
}

/// The built-in kinds whose lowercased name is in `filter`. See [`Catalog::selected_kinds`].
pub fn selected_kinds(filter: &BTreeSet<String>) -> Vec<ResourceKind> {
	Catalog::default().selected_kinds(filter)
}

fn is_builtin_name(name: &str) -> bool {
	BUILTIN_KINDS.iter().any(|kind| kind.name() == name)
}

fn builtin_api_version(kind: &ResourceKind) -> Option<String> {
	let api_version = match kind {
		ResourceKind::Deployment | ResourceKind::StatefulSet | ResourceKind::DaemonSet => "apps/v1",
		ResourceKind::CronJob | ResourceKind::Job => "batch/v1",
		ResourceKind::Ingress => "networking.k8s.io/v1",
		ResourceKind::Role | ResourceKind::RoleBinding => "rbac.authorization.k8s.io/v1",
		ResourceKind::Dynamic(_) => return None,
		_ => "v1",
	};
	Some(api_version.to_string())
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	fn filter(names: &[&str]) -> BTreeSet<String> {
		names.iter().map(ToString::to_string).collect()
	}

	fn names(kinds: &[ResourceKind]) -> Vec<&str> {
		kinds.iter().map(ResourceKind::name).collect()
	}

	#[test]
	fn test_all_kinds_order() {
		assert_eq!(
			names(&all_kinds()),
			[
				"Pod",
				"Deployment",
				"Service",
				"ConfigMap",
				"Secret",
				"PersistentVolumeClaim",
				"ServiceAccount",
				"StatefulSet",
				"DaemonSet",
				"Ingress",
				"Role",
				"RoleBinding",
				"CronJob",
				"Job",
			]
		);
	}

	#[test]
	fn test_empty_filter_selects_everything() {
		assert_eq!(selected_kinds(&BTreeSet::new()), all_kinds());
	}

	#[test]
	fn test_filter_keeps_catalog_order() {
		let kinds = selected_kinds(&filter(&["job", "pod", "configmap"]));
		assert_eq!(names(&kinds), ["Pod", "ConfigMap", "Job"]);
	}

	#[test]
	fn test_filter_ignores_unknown_names() {
		let kinds = selected_kinds(&filter(&["widget", "secret"]));
		assert_eq!(names(&kinds), ["Secret"]);
		assert!(selected_kinds(&filter(&["widget"])).is_empty());
	}

	#[test]
	fn test_filter_is_lowercase() {
		assert!(selected_kinds(&filter(&["Pod"])).is_empty());
		assert_eq!(
			names(&selected_kinds(&filter(&["persistentvolumeclaim"]))),
			["PersistentVolumeClaim"]
		);
	}

	#[test]
	fn test_extra_kinds_follow_builtins() {
		let catalog = Catalog::with_extra_kinds([
			GroupVersionKind::gvk("autoscaling", "v2", "HorizontalPodAutoscaler"),
			GroupVersionKind::gvk("policy", "v1", "PodDisruptionBudget"),
		]);
		let kinds = catalog.all_kinds();
		assert_eq!(kinds.len(), 16);
		assert_eq!(
			names(&kinds[14..]),
			["HorizontalPodAutoscaler", "PodDisruptionBudget"]
		);

		let selected = catalog.selected_kinds(&filter(&["pod"]));
		assert_eq!(
			names(&selected),
			["Pod", "HorizontalPodAutoscaler", "PodDisruptionBudget"]
		);
	}

	#[test]
	fn test_extra_kind_names_do_not_select_builtins() {
		let shadowing_pod = GroupVersionKind::gvk("example.com", "v1", "Pod");
		let catalog = Catalog::with_extra_kinds([shadowing_pod.clone()]);
		let selected = catalog.selected_kinds(&filter(&["service"]));
		assert_eq!(
			selected,
			[ResourceKind::Service, ResourceKind::Dynamic(shadowing_pod)]
		);
	}

	#[rstest]
	#[case::builtin(ResourceKind::Pod, "Pod")]
	#[case::discovered(
		ResourceKind::Dynamic(GroupVersionKind::gvk(
			"autoscaling",
			"v2",
			"HorizontalPodAutoscaler"
		)),
		"HorizontalPodAutoscaler"
	)]
	#[case::shadows_builtin(
		ResourceKind::Dynamic(GroupVersionKind::gvk("example.com", "v1", "Pod")),
		"Pod.example.com"
	)]
	#[case::shadows_core_builtin(
		ResourceKind::Dynamic(GroupVersionKind::gvk("", "v2", "Service")),
		"Service.v2"
	)]
	fn test_directory(#[case] kind: ResourceKind, #[case] expected: &str) {
		assert_eq!(kind.directory(), expected);
	}

	#[test]
	fn test_extra_kinds_sharing_a_directory() {
		let catalog = Catalog::with_extra_kinds([
			GroupVersionKind::gvk("example.com", "v1", "Widget"),
			GroupVersionKind::gvk("example.com", "v1beta1", "Widget"),
			GroupVersionKind::gvk("example.com", "v1", "Pod"),
			GroupVersionKind::gvk("other.io", "v1", "Pod"),
		]);
		assert_eq!(
			catalog.extra_kinds(),
			[
				GroupVersionKind::gvk("example.com", "v1", "Widget"),
				GroupVersionKind::gvk("example.com", "v1", "Pod"),
				GroupVersionKind::gvk("other.io", "v1", "Pod"),
			]
		);
	}

	#[test]
	fn test_extra_kinds_drop_duplicates() {
		let catalog = Catalog::with_extra_kinds([
			GroupVersionKind::gvk("", "v1", "Pod"),
			GroupVersionKind::gvk("apps", "v1", "Deployment"),
			GroupVersionKind::gvk("", "v1", "Endpoints"),
			GroupVersionKind::gvk("", "v1", "Endpoints"),
		]);
		assert_eq!(catalog.extra_kinds().len(), 1);
		assert_eq!(catalog.all_kinds().len(), 15);
	}

	#[test]
	fn test_display() {
		assert_eq!(ResourceKind::CronJob.to_string(), "CronJob");
		let hpa = ResourceKind::Dynamic(GroupVersionKind::gvk(
			"autoscaling",
			"v2",
			"HorizontalPodAutoscaler",
		));
		assert_eq!(hpa.to_string(), "autoscaling/v2/HorizontalPodAutoscaler");
		assert_eq!(hpa.name(), "HorizontalPodAutoscaler");
	}

	#[rstest]
	#[case::core("v1/Endpoints", Some(("", "v1", "Endpoints")))]
	#[case::grouped(
		"autoscaling/v2/HorizontalPodAutoscaler",
		Some(("autoscaling", "v2", "HorizontalPodAutoscaler"))
	)]
	#[case::missing_kind("apps/v1/", None)]
	#[case::missing_version("Deployment", None)]
	#[case::empty_group("/v1/Pod", None)]
	fn test_parse_kind_reference(
		#[case] reference: &str,
		#[case] expected: Option<(&str, &str, &str)>,
	) {
		let expected =
			expected.map(|(group, version, kind)| GroupVersionKind::gvk(group, version, kind));
		assert_eq!(parse_kind_reference(reference), expected);
	}

	#[rstest]
	#[case::not_found("pods \"x\" not found", true)]
	#[case::missing_resource("the server could not find the requested resource", true)]
	#[case::no_matches("no matches for kind \"Widget\" in version \"v1\"", true)]
	#[case::no_resource_type("the server doesn't have a resource type for batch/v1beta1", true)]
	#[case::upper_case("The Server Could Not Find The Requested Resource", true)]
	#[case::forbidden("pods is forbidden: User cannot list resource", false)]
	#[case::internal("internal error", false)]
	fn test_is_not_found_message(#[case] message: &str, #[case] expected: bool) {
		assert_eq!(is_not_found_message(message), expected);
	}

	#[test]
	fn test_no_matches_for_kind_is_not_supported() {
		let err = ListError::NoMatchesForKind {
			api_version: "example.com/v1".to_string(),
			kind: "Widget".to_string(),
		};
		assert!(err.is_kind_not_supported());
		assert_eq!(
			err.to_string(),
			"no matches for kind \"Widget\" in version \"example.com/v1\""
		);
	}

	#[test]
	fn test_cluster_scoped_is_a_failure() {
		let err = ListError::ClusterScoped {
			api_version: "v1".to_string(),
			kind: "Namespace".to_string(),
		};
		assert!(!err.is_kind_not_supported());
	}
}
