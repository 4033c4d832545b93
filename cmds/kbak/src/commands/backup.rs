//! Backup command handler.
//!
//! Resolves the namespaces and kinds to back up, creates the timestamped output directory and
//! runs the backup of each namespace, then prints a summary.

use std::{
	collections::BTreeSet,
	fmt,
	io::{IsTerminal, Write},
	path::{Path, PathBuf},
	process::ExitCode,
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, ValueEnum};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
	api::{Api, ListParams},
	core::GroupVersionKind,
	Client,
};
use nu_ansi_term::{Color, Style};
use tracing::{instrument, Level};

use crate::{
	backup::{perform_backup, BackupStats},
	config::KbakConfig,
	k8s::{
		catalog::{parse_kind_reference, Catalog, ResourceKind},
		client::{ClusterConnection, ConnectionOptions},
	},
};

/// Output directory when neither `--output` nor the config file set one.
pub const DEFAULT_OUTPUT_DIR: &str = "backups";

/// Directory holding the per-namespace directories of an all-namespaces backup.
pub const ALL_NAMESPACES_DIR: &str = "all-namespaces";

/// Timestamp directory format, e.g. `05Mar2025-14:30`.
pub const TIMESTAMP_FORMAT: &str = "%d%b%Y-%H:%M";

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
	/// Colorize when stdout is a terminal.
	#[default]
	Auto,

	/// Always colorize.
	Always,

	/// Never colorize.
	Never,
}

impl ColorMode {
	pub fn should_colorize(self) -> bool {
		match self {
			Self::Auto => std::io::stdout().is_terminal(),
			Self::Always => true,
			Self::Never => false,
		}
	}
}

impl fmt::Display for ColorMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ColorMode::Auto => write!(f, "auto"),
			ColorMode::Always => write!(f, "always"),
			ColorMode::Never => write!(f, "never"),
		}
	}
}

/// Flags selecting individual built-in kinds. Without any, every kind is backed up.
#[derive(Args, Debug, Clone, Default)]
#[group(id = "kind_flags", multiple = true)]
pub struct KindFlags {
	/// Backup only pods
	#[arg(long)]
	pub pod: bool,

	/// Backup only deployments
	#[arg(long)]
	pub deployment: bool,

	/// Backup only services
	#[arg(long)]
	pub service: bool,

	/// Backup only configmaps
	#[arg(long)]
	pub configmap: bool,

	/// Backup only secrets
	#[arg(long)]
	pub secret: bool,

	/// Backup only persistent volume claims
	#[arg(long)]
	pub pvc: bool,

	/// Backup only service accounts
	#[arg(long)]
	pub serviceaccount: bool,

	/// Backup only statefulsets
	#[arg(long)]
	pub statefulset: bool,

	/// Backup only daemonsets
	#[arg(long)]
	pub daemonset: bool,

	/// Backup only ingresses
	#[arg(long)]
	pub ingress: bool,

	/// Backup only roles
	#[arg(long)]
	pub role: bool,

	/// Backup only rolebindings
	#[arg(long)]
	pub rolebinding: bool,

	/// Backup only cronjobs
	#[arg(long)]
	pub cronjob: bool,

	/// Backup only jobs
	#[arg(long)]
	pub job: bool,
}

impl KindFlags {
	/// Lowercased kind names of the set flags.
	pub fn filter(&self) -> BTreeSet<String> {
		[
			(self.pod, "pod"),
			(self.deployment, "deployment"),
			(self.service, "service"),
			(self.configmap, "configmap"),
			(self.secret, "secret"),
			(self.pvc, "persistentvolumeclaim"),
			(self.serviceaccount, "serviceaccount"),
			(self.statefulset, "statefulset"),
			(self.daemonset, "daemonset"),
			(self.ingress, "ingress"),
			(self.role, "role"),
			(self.rolebinding, "rolebinding"),
			(self.cronjob, "cronjob"),
			(self.job, "job"),
		]
		.into_iter()
		.filter_map(|(set, name)| set.then(|| name.to_string()))
		.collect()
	}
}

#[derive(Args, Debug, Clone)]
pub struct BackupArgs {
	/// Namespace to backup (uses current namespace from kubeconfig if not specified)
	#[arg(short, long)]
	pub namespace: Option<String>,

	/// Backup resources from all namespaces
	#[arg(short = 'A', long)]
	pub all_namespaces: bool,

	/// Output directory for backup files [default: backups]
	#[arg(short, long)]
	pub output: Option<String>,

	/// Path to kubeconfig file
	#[arg(long)]
	pub kubeconfig: Option<String>,

	/// Kubeconfig context to use instead of the current one
	#[arg(long)]
	pub context: Option<String>,

	/// Show verbose output
	#[arg(short, long)]
	pub verbose: bool,

	/// Log level (possible values: error, warn, info, debug, trace)
	#[arg(long)]
	pub log_level: Option<Level>,

	/// Color output mode
	#[arg(long, value_enum, default_value_t)]
	pub color: ColorMode,

	/// Backup all resource types (default)
	#[arg(long, conflicts_with = "kind_flags")]
	pub all_resources: bool,

	#[command(flatten)]
	pub kinds: KindFlags,

	/// Additional kind to backup, as <apiVersion>/<Kind> (e.g. autoscaling/v2/HorizontalPodAutoscaler)
	#[arg(long = "extra-kind", value_name = "KIND", value_parser = parse_extra_kind)]
	pub extra_kinds: Vec<GroupVersionKind>,
}

fn parse_extra_kind(value: &str) -> Result<GroupVersionKind, String> {
	parse_kind_reference(value)
		.ok_or_else(|| format!("expected <apiVersion>/<Kind>, e.g. apps/v1/Deployment, got {value:?}"))
}

/// Which namespaces to back up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceSelection {
	/// One namespace, named on the command line.
	Namespace(String),

	/// The namespace of the active kubeconfig context.
	Current,

	/// Every namespace of the cluster.
	All,
}

/// Options for running a backup.
#[derive(Debug, Clone)]
pub struct BackupOpts {
	/// Base output directory.
	pub output: PathBuf,
	/// Namespaces to back up.
	pub namespaces: NamespaceSelection,
	/// Kinds to back up, in order.
	pub kinds: Vec<ResourceKind>,
	/// Whether only some kinds were selected.
	pub selected: bool,
	/// Enable verbose progress messages.
	pub verbose: bool,
	/// Colorize the summary.
	pub color: bool,
	/// Name of the timestamp directory.
	pub timestamp: String,
}

impl BackupOpts {
	/// Resolve command line arguments against the config file.
	///
	/// Command line values take precedence; extra kinds from both sources are merged.
	pub fn resolve(args: &BackupArgs, config: &KbakConfig) -> Result<Self> {
		let namespaces = if args.all_namespaces {
			if args.namespace.is_some() {
				tracing::warn!("--namespace is ignored when --all-namespaces is used");
			}
			NamespaceSelection::All
		} else {
			match &args.namespace {
				Some(namespace) => NamespaceSelection::Namespace(namespace.clone()),
				None => NamespaceSelection::Current,
			}
		};

		let mut extra_kinds = config
			.extra_kind_gvks()
			.context("reading extra kinds from config file")?;
		extra_kinds.extend(args.extra_kinds.iter().cloned());
		let catalog = Catalog::with_extra_kinds(extra_kinds);

		// Extra kinds are always backed up, also next to individually selected kinds.
		let filter = if args.all_resources {
			BTreeSet::new()
		} else {
			args.kinds.filter()
		};
		let selected = !filter.is_empty();

		let output = args
			.output
			.clone()
			.or_else(|| config.output.clone())
			.unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());

		Ok(Self {
			output: PathBuf::from(output),
			namespaces,
			kinds: catalog.selected_kinds(&filter),
			selected,
			verbose: args.verbose,
			color: args.color.should_colorize(),
			timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
		})
	}
}

/// Result of a backup across one or more namespaces.
#[derive(Debug, Clone)]
pub struct BackupOutcome {
	/// Directory holding the backup.
	pub backup_dir: PathBuf,
	/// Summed counters of every namespace.
	pub stats: BackupStats,
}

impl BackupOutcome {
	pub fn exit_code(&self) -> ExitCode {
		if self.stats.error_count > 0 {
			ExitCode::FAILURE
		} else {
			ExitCode::SUCCESS
		}
	}
}

/// Run the backup command.
pub fn run<W: Write>(args: BackupArgs, writer: W) -> Result<ExitCode> {
	let cwd = std::env::current_dir().context("reading working directory")?;
	let config = KbakConfig::load_from_directory(&cwd)?.unwrap_or_default();
	let opts = BackupOpts::resolve(&args, &config)?;

	// Create a tokio runtime for async operations
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;

	runtime.block_on(async {
		let connection = ClusterConnection::connect(&ConnectionOptions {
			kubeconfig: args.kubeconfig,
			context: args.context,
		})
		.await
		.context("initializing Kubernetes client")?;

		let outcome = backup(&connection, &opts, writer).await?;
		Ok(outcome.exit_code())
	})
}

/// Back up the namespaces selected by `opts` and print a summary to `writer`.
#[instrument(skip_all, fields(cluster = %connection.cluster_identifier()))]
pub async fn backup<W: Write>(
	connection: &ClusterConnection,
	opts: &BackupOpts,
	writer: W,
) -> Result<BackupOutcome> {
	let mut out = Summary::new(writer, opts.color);
	let timestamp_dir = opts.output.join(&opts.timestamp);

	let outcome = match &opts.namespaces {
		NamespaceSelection::All => {
			backup_all_namespaces(connection.client(), &timestamp_dir, opts, &mut out).await?
		}
		selection => {
			let namespace = match selection {
				NamespaceSelection::Namespace(namespace) => namespace.clone(),
				_ => {
					let namespace = connection.default_namespace().to_string();
					if opts.verbose {
						tracing::info!(namespace, "using current namespace");
					}
					namespace
				}
			};
			backup_namespace(connection.client(), &namespace, &timestamp_dir, opts, &mut out)
				.await?
		}
	};

	if outcome.stats.error_count > 0 {
		out.line(
			Color::Red.bold(),
			&format!("Completed with {} errors", outcome.stats.error_count),
		)?;
	}

	Ok(outcome)
}

async fn backup_namespace<W: Write>(
	client: &Client,
	namespace: &str,
	timestamp_dir: &Path,
	opts: &BackupOpts,
	out: &mut Summary<W>,
) -> Result<BackupOutcome> {
	let backup_dir = timestamp_dir.join(namespace);
	std::fs::create_dir_all(&backup_dir)
		.with_context(|| format!("creating output directory {}", backup_dir.display()))?;

	let scope = if opts.selected { "selected" } else { "all" };
	out.line(
		Color::Blue.bold(),
		&format!(
			"Starting backup of {scope} resource types from namespace '{namespace}' to '{}'",
			backup_dir.display()
		),
	)?;

	let stats = perform_backup(client, namespace, &backup_dir, &opts.kinds, opts.verbose).await;
	out.kind_counts(&opts.kinds, &stats)?;

	if stats.resource_count > 0 {
		out.line(
			Color::Green.bold(),
			&format!(
				"Backup completed successfully to {} ({} resources total)",
				backup_dir.display(),
				stats.resource_count
			),
		)?;
	} else {
		out.line(
			Color::Yellow.bold(),
			&format!("No resources found to backup in namespace '{namespace}'"),
		)?;
	}

	Ok(BackupOutcome { backup_dir, stats })
}

async fn backup_all_namespaces<W: Write>(
	client: &Client,
	timestamp_dir: &Path,
	opts: &BackupOpts,
	out: &mut Summary<W>,
) -> Result<BackupOutcome> {
	let namespaces = list_namespaces(client).await?;

	let parent_dir = timestamp_dir.join(ALL_NAMESPACES_DIR);
	std::fs::create_dir_all(&parent_dir)
		.with_context(|| format!("creating output directory {}", parent_dir.display()))?;

	out.line(
		Color::Blue.bold(),
		&format!("Starting backup of all namespaces to '{}'", parent_dir.display()),
	)?;

	let mut total = BackupStats::default();
	for namespace in &namespaces {
		let backup_dir = parent_dir.join(namespace);
		if let Err(e) = std::fs::create_dir_all(&backup_dir) {
			tracing::error!(
				namespace,
				path = %backup_dir.display(),
				error = %e,
				"failed to create namespace directory"
			);
			total.error_count += 1;
			continue;
		}

		out.line(Style::new().fg(Color::Blue), &format!("Processing namespace: {namespace}"))?;
		let stats =
			perform_backup(client, namespace, &backup_dir, &opts.kinds, opts.verbose).await;
		out.kind_counts(&opts.kinds, &stats)?;
		total.merge(stats);
	}

	if total.resource_count > 0 {
		out.line(
			Color::Green.bold(),
			&format!(
				"Backup completed successfully to {} ({} resources total across all namespaces)",
				parent_dir.display(),
				total.resource_count
			),
		)?;
	} else {
		out.line(Color::Yellow.bold(), "No resources found to backup in any namespace")?;
	}

	Ok(BackupOutcome {
		backup_dir: parent_dir,
		stats: total,
	})
}

/// Names of every namespace of the cluster, in listing order.
#[instrument(skip_all)]
pub async fn list_namespaces(client: &Client) -> Result<Vec<String>> {
	let api: Api<Namespace> = Api::all(client.clone());
	let list = api
		.list(&ListParams::default())
		.await
		.context("listing namespaces")?;
	Ok(list
		.items
		.into_iter()
		.filter_map(|namespace| namespace.metadata.name)
		.collect())
}

/// User-facing summary lines.
struct Summary<W> {
	writer: W,
	color: bool,
}

impl<W: Write> Summary<W> {
	fn new(writer: W, color: bool) -> Self {
		Self { writer, color }
	}

	fn line(&mut self, style: Style, text: &str) -> Result<()> {
		if self.color {
			writeln!(self.writer, "{}", style.paint(text))?;
		} else {
			writeln!(self.writer, "{text}")?;
		}
		Ok(())
	}

	/// One line per kind with written manifests, in backup order.
	fn kind_counts(&mut self, kinds: &[ResourceKind], stats: &BackupStats) -> Result<()> {
		for kind in kinds {
			let directory = kind.directory();
			if let Some(count) = stats.resources_backed_up.get(directory.as_ref()) {
				self.line(
					Style::new().fg(Color::Green),
					&format!("  Backed up {count} {directory} resources"),
				)?;
			}
		}
		Ok(())
	}
}
