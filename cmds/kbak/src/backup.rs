//! Backup of one namespace.
//!
//! Kinds are processed in catalog order and items in listing order. Each item is cleaned,
//! serialized and written to `<backup_dir>/<Kind>/<name>.yaml`. Failures are counted in
//! [`BackupStats`] and never abort the run.

use std::{
	collections::BTreeMap,
	fs,
	path::{Path, PathBuf},
};

use kube::Client;
use thiserror::Error;
use tracing::instrument;

use crate::{
	clean::clean,
	k8s::{catalog::ResourceKind, object::ResourceObject},
	sanitize::sanitize_filename,
	yaml::{to_yaml, SerializeError},
};

/// Extension of every written manifest.
const MANIFEST_EXTENSION: &str = "yaml";

/// Counters of one backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupStats {
	/// Manifests written.
	pub resource_count: usize,
	/// Failures of any kind.
	pub error_count: usize,
	/// Manifests written per kind. Kinds without any are absent.
	pub resources_backed_up: BTreeMap<String, usize>,
	/// Failures per kind.
	pub resource_errors: BTreeMap<String, usize>,
}

impl BackupStats {
	fn record_error(&mut self, kind: &str) {
		self.error_count += 1;
		*self.resource_errors.entry(kind.to_string()).or_default() += 1;
	}

	fn record_backed_up(&mut self, kind: &str, count: usize) {
		self.resource_count += count;
		*self.resources_backed_up.entry(kind.to_string()).or_default() += count;
	}

	/// Add the counters of another run, e.g. of another namespace.
	pub fn merge(&mut self, other: BackupStats) {
		self.resource_count += other.resource_count;
		self.error_count += other.error_count;
		for (kind, count) in other.resources_backed_up {
			*self.resources_backed_up.entry(kind).or_default() += count;
		}
		for (kind, count) in other.resource_errors {
			*self.resource_errors.entry(kind).or_default() += count;
		}
	}
}

/// Failure to back up a single item.
#[derive(Debug, Error)]
pub enum ItemError {
	#[error("failed to serialize manifest")]
	Serialize(#[from] SerializeError),

	#[error("failed to write {}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Back up every instance of `kinds` in `namespace` below `backup_dir`.
///
/// `verbose` enables the progress messages that are otherwise only emitted at debug level.
#[instrument(skip_all, fields(namespace = %namespace, backup_dir = %backup_dir.display()))]
pub async fn perform_backup(
	client: &Client,
	namespace: &str,
	backup_dir: &Path,
	kinds: &[ResourceKind],
	verbose: bool,
) -> BackupStats {
	let mut stats = BackupStats::default();

	if kinds.is_empty() {
		if verbose {
			tracing::warn!("no resource kinds selected, nothing to back up");
		}
		return stats;
	}

	for kind in kinds {
		let list = match kind.list(client, namespace).await {
			Ok(list) => list,
			Err(e) if e.is_kind_not_supported() => {
				if verbose {
					tracing::info!(kind = %kind, "resource kind not available in the cluster, skipping");
				} else {
					tracing::debug!(kind = %kind, error = %e, "resource kind not available");
				}
				continue;
			}
			Err(e) => {
				tracing::error!(kind = %kind, namespace, error = %e, "failed to list resources");
				stats.record_error(&kind.directory());
				continue;
			}
		};

		let (items, total) = list.extract();
		if verbose {
			tracing::info!(kind = %kind, namespace, count = total, "found resources");
		}
		if items.is_empty() {
			continue;
		}

		backup_items(&kind.directory(), items, backup_dir, verbose, &mut stats);
	}

	stats
}

/// Write `items` of one kind to `<backup_dir>/<kind>/`, updating `stats`.
///
/// The kind directory is created before the first item is written, so a list of empty
/// placeholders leaves no directory behind.
pub fn backup_items(
	kind: &str,
	items: Vec<ResourceObject>,
	backup_dir: &Path,
	verbose: bool,
	stats: &mut BackupStats,
) {
	let kind_dir = backup_dir.join(kind);
	let mut dir_created = false;
	let mut backed_up = 0;
	for (index, mut item) in items.into_iter().enumerate() {
		if item.is_empty() {
			continue;
		}

		let mut name = item.name();
		if name.is_empty() {
			name = format!("unknown-{index}");
		}
		let file_stem = sanitize_filename(&name);
		if verbose && file_stem != name {
			tracing::info!(kind, name, file_stem, "sanitized resource name");
		}

		if !dir_created {
			if let Err(e) = fs::create_dir_all(&kind_dir) {
				tracing::error!(
					kind,
					path = %kind_dir.display(),
					error = %e,
					"failed to create kind directory"
				);
				stats.record_error(kind);
				return;
			}
			dir_created = true;
		}

		clean(&mut item);
		let path = kind_dir.join(format!("{file_stem}.{MANIFEST_EXTENSION}"));
		match write_manifest(&item, &path) {
			Ok(()) => {
				tracing::debug!(
					api_version = item.api_version().unwrap_or_default(),
					object_kind = item.kind().unwrap_or_default(),
					name,
					path = %path.display(),
					"wrote manifest"
				);
				backed_up += 1;
			}
			Err(e) => {
				tracing::error!(kind, name, error = %e, "failed to back up resource");
				stats.record_error(kind);
			}
		}
	}

	if backed_up > 0 {
		tracing::info!(kind, count = backed_up, "backed up {backed_up} {kind} resources");
		stats.record_backed_up(kind, backed_up);
	}
}

fn write_manifest(obj: &ResourceObject, path: &Path) -> Result<(), ItemError> {
	let manifest = to_yaml(obj)?;
	fs::write(path, manifest).map_err(|source| ItemError::Write {
		path: path.to_path_buf(),
		source,
	})
}
