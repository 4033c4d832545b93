//! Configuration file support for kbak
//!
//! Supports `.kbak-config.yaml` files that can be placed anywhere in the directory
//! hierarchy. kbak searches from the working directory upward to the filesystem root.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use kube::core::GroupVersionKind;
use serde::Deserialize;

use crate::k8s::catalog::gvk_from_api_version;

/// The name of the config file kbak looks for
pub const CONFIG_FILE_NAME: &str = ".kbak-config.yaml";

/// Root configuration structure for .kbak-config.yaml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KbakConfig {
	/// Output directory used when `--output` is not given
	#[serde(default)]
	pub output: Option<String>,

	/// Kinds without a compiled model to back up after the built-in ones
	#[serde(default)]
	pub extra_kinds: Vec<ExtraKind>,
}

/// A kind listed through API discovery, e.g. `autoscaling/v2` `HorizontalPodAutoscaler`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraKind {
	pub api_version: String,
	pub kind: String,
}

impl ExtraKind {
	pub fn to_gvk(&self) -> Result<GroupVersionKind> {
		match gvk_from_api_version(&self.api_version, &self.kind) {
			Some(gvk) => Ok(gvk),
			None => bail!(
				"invalid extra kind: apiVersion {:?}, kind {:?}",
				self.api_version,
				self.kind
			),
		}
	}
}

impl KbakConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		if content.trim().is_empty() {
			return Ok(Self::default());
		}
		let config: KbakConfig = serde_yaml::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		Ok(config)
	}

	/// Extra kinds as group/version/kind triples, in file order
	pub fn extra_kind_gvks(&self) -> Result<Vec<GroupVersionKind>> {
		self.extra_kinds.iter().map(ExtraKind::to_gvk).collect()
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	// Canonicalize if possible to handle relative paths
	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.is_file() {
			return Some(config_path);
		}

		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => break,
		}
	}

	None
}
