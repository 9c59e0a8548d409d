//! Tracing setup for the CLI.
//!
//! Two sinks: a compact stream on stderr and, when a log file is configured,
//! JSON lines appended to it. stdout carries only specs, prompts and plans.
//! Command failures reach the user through [`report_error`], which does not
//! depend on either sink.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, Once};

use anyhow::Context;
use tracing::error;
use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_LEVEL: &str = "info";
const ENV_VAR_NAME: &str = "PHPLAN_LOG";

/// Log file: this crate down to debug, dependencies (reqwest, hyper) only
/// when they warn.
const FILE_DIRECTIVES: &str = "warn,phplan=debug";

/// Target of the event emitted by [`report_error`]. Kept off stderr, where
/// the report is already printed.
const REPORT_TARGET: &str = "phplan::report";

static INIT: Once = Once::new();

/// Install the global subscriber. Calls after the first are no-ops.
///
/// The stderr filter comes from `PHPLAN_LOG`, then `log_level`, then `info`.
/// The log file filter is fixed to [`FILE_DIRECTIVES`].
pub fn init(log_level: Option<&str>, log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut outcome = Ok(());
    INIT.call_once(|| outcome = install(log_level, log_file));
    outcome
}

/// Print a command failure as `error: ...` on `out` and record it in the
/// log file, whatever the stderr filter says.
pub fn report_error(out: &mut dyn Write, err: &anyhow::Error) {
    let _ = writeln!(out, "error: {err:#}");
    error!(target: REPORT_TARGET, "{err:#}");
}

fn install(log_level: Option<&str>, log_file: Option<&Path>) -> anyhow::Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter(log_level))
        .with_filter(filter_fn(|meta| meta.target() != REPORT_TARGET));

    let file_sink = log_file.map(open_log_file).transpose()?.map(file_layer);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_sink)
        .try_init()
        .context("failed to initialize logging")
}

fn stderr_filter(log_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR_NAME)
        .unwrap_or_else(|_| EnvFilter::new(log_level.unwrap_or(DEFAULT_LOG_LEVEL)))
}

fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .json()
        .with_filter(EnvFilter::new(FILE_DIRECTIVES))
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?,
        _ => {}
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
