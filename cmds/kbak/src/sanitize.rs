//! Filesystem-safe file stems for resource names.
//!
//! Every resource name goes through [`sanitize_filename`] before it becomes part of a path.
//! The function is the only thing standing between a hostile or malformed resource name
//! (empty, `.`, `../../etc/passwd`, `a:b|c`) and the backup directory.

use std::path::Path;

/// Returned for names that sanitize down to nothing.
pub const UNNAMED: &str = "unnamed";

/// Returned for the name `.`.
pub const DOT: &str = "_dot_";

/// Characters that break paths on at least one supported platform.
const RESERVED_CHARS: [char; 10] = [' ', '/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Map a resource name to a filesystem-safe, non-hidden file stem.
///
/// The mapping is pure, total and idempotent: sanitizing an already sanitized stem returns
/// it unchanged. The reserved stems [`UNNAMED`] and [`DOT`] are fixed points.
pub fn sanitize_filename(name: &str) -> String {
	if name.is_empty() || name == UNNAMED {
		return UNNAMED.to_string();
	}
	if name == "." || name == DOT {
		return DOT.to_string();
	}

	let mut result: String = name
		.chars()
		.map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
		.collect();

	if result.starts_with('.') {
		result.insert(0, '_');
	}

	// Separators are gone at this point, but `..` and `.` can still survive as a whole
	// component, and those have no file name.
	let result = Path::new(&result)
		.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_default();

	let trimmed = result.trim_matches(|c| matches!(c, '.' | '_' | '-'));
	if trimmed.is_empty() {
		return UNNAMED.to_string();
	}
	trimmed.to_string()
}
