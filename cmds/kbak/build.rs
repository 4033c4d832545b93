//! Embeds the version reported by `kbak --version`.

use std::process::Command;

/// Version Cargo.toml carries until a release sets the real one.
const UNRELEASED_VERSION: &str = "0.1.0";

fn main() {
	for path in ["../../.git/HEAD", "../../.git/refs/"] {
		println!("cargo:rerun-if-changed={path}");
	}
	println!("cargo:rustc-env=KBAK_VERSION={}", version());
}

/// The package version of a release build. Unreleased builds use an exact tag on HEAD, or the
/// placeholder version with the short commit hash as build metadata.
fn version() -> String {
	let package_version = env!("CARGO_PKG_VERSION");
	if package_version != UNRELEASED_VERSION {
		return package_version.to_string();
	}

	git(&["describe", "--tags", "--exact-match", "HEAD"])
		.map(|tag| tag.trim_start_matches('v').to_string())
		.or_else(|| {
			git(&["rev-parse", "--short", "HEAD"])
				.map(|commit| format!("{UNRELEASED_VERSION}+{commit}"))
		})
		.unwrap_or_else(|| package_version.to_string())
}

/// Trimmed stdout of a successful, non-empty git invocation.
fn git(args: &[&str]) -> Option<String> {
	let output = Command::new("git").args(args).output().ok()?;
	if !output.status.success() {
		return None;
	}
	let stdout = String::from_utf8(output.stdout).ok()?;
	let stdout = stdout.trim();
	(!stdout.is_empty()).then(|| stdout.to_string())
}
