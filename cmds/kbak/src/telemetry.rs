//! Log output.
//!
//! Events go to stderr; stdout carries the backup summary only.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable read for filter directives when `--log-level` is not given.
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

/// How log events are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
	/// Multi-line, human readable events.
	Pretty,
	/// One JSON object per event, for log collectors.
	Json,
}

impl LogFormat {
	/// Pretty output when stderr is a terminal, JSON otherwise.
	pub fn for_stderr() -> Self {
		if std::io::stderr().is_terminal() {
			Self::Pretty
		} else {
			Self::Json
		}
	}
}

/// Install the global subscriber.
///
/// `log_level` (the `--log-level` flag) wins over `RUST_LOG`, which wins over `default_level`.
pub fn init(log_level: Option<Level>, default_level: Level) {
	let env_directives = std::env::var(LOG_FILTER_ENV).ok();
	let filter = log_filter(log_level, env_directives.as_deref(), default_level);

	let fmt_layer = match LogFormat::for_stderr() {
		LogFormat::Pretty => tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.pretty()
			.boxed(),
		LogFormat::Json => tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.json()
			.boxed(),
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt_layer)
		.init();
}

/// Build the event filter. Invalid directives in `env_directives` are ignored.
fn log_filter(
	log_level: Option<Level>,
	env_directives: Option<&str>,
	default_level: Level,
) -> EnvFilter {
	match log_level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(default_level.into())
			.parse_lossy(env_directives.unwrap_or_default()),
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use tracing_subscriber::filter::LevelFilter;

	use super::*;

	#[rstest]
	#[case::flag_wins(Some(Level::WARN), Some("trace"), Level::INFO, LevelFilter::WARN)]
	#[case::env_over_default(None, Some("trace"), Level::INFO, LevelFilter::TRACE)]
	#[case::env_unset(None, None, Level::DEBUG, LevelFilter::DEBUG)]
	#[case::env_empty(None, Some(""), Level::INFO, LevelFilter::INFO)]
	fn test_log_filter_precedence(
		#[case] log_level: Option<Level>,
		#[case] env_directives: Option<&str>,
		#[case] default_level: Level,
		#[case] expected: LevelFilter,
	) {
		let filter = log_filter(log_level, env_directives, default_level);
		assert_eq!(filter.max_level_hint(), Some(expected));
	}
}
