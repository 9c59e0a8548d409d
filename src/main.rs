use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use phplan::catalog;
use phplan::cli::{Cli, Commands, HistoryCommand};
use phplan::config::AppConfig;
use phplan::error::PlannerError;
use phplan::gemini::GeminiClient;
use phplan::generate::GenerationOrchestrator;
use phplan::ledger::HistoryLedger;
use phplan::preset;
use phplan::prompt;
use phplan::storage::{FileStorage, Storage};
use phplan::store::ConfigStore;

const CLEAR_CONFIRMATION: &str =
    "Are you sure you want to delete all history? This action cannot be undone. [y/N] ";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            phplan::logging::report_error(&mut io::stderr().lock(), &e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.global)?;

    phplan::logging::init(config.log_level.as_deref(), config.log_file.as_deref())?;

    debug!(?config, "config loaded");

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.data_dir));
    let mut stdout = io::stdout().lock();
    execute(cli.command, &config, storage, &mut stdout, confirm_on_stdin).await
}

async fn execute(
    command: Commands,
    config: &AppConfig,
    storage: Arc<dyn Storage>,
    out: &mut dyn Write,
    confirm: impl FnOnce() -> bool,
) -> anyhow::Result<()> {
    let mut store = ConfigStore::load(storage.clone());

    match command {
        Commands::Show => write_json(out, store.spec())?,

        Commands::Set(args) => {
            store.set_field_text(args.field, &args.value)?;
            writeln!(out, "{} updated", args.field)?;
        }

        Commands::SetList(args) => {
            let count = args.values.len();
            store.set_list_field(args.field, args.values)?;
            writeln!(out, "{} set ({count} items)", args.field)?;
        }

        Commands::Toggle(args) => {
            store.toggle_set_membership(args.field, &args.value, !args.off)?;
            let verb = if args.off { "removed from" } else { "added to" };
            writeln!(out, "{} {verb} {}", args.value, args.field)?;
        }

        Commands::Framework(args) => {
            store.apply_framework(&args.name);
            if preset::resolve(&args.name).is_some() {
                writeln!(out, "framework set to {} (preset applied)", args.name)?;
            } else {
                writeln!(out, "framework set to {} (no preset)", args.name)?;
            }
        }

        Commands::Import(args) => {
            let text = fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            if let Err(e) = store.import_json(&text) {
                if let PlannerError::ImportFormatInvalid { detail, .. } = &e {
                    debug!(file = %args.file.display(), detail = %detail, "import rejected");
                }
                return Err(e.into());
            }
            writeln!(out, "imported {}", args.file.display())?;
        }

        Commands::Export(args) => {
            let dir = args.output_dir.unwrap_or_else(|| PathBuf::from("."));
            let path = store.write_export(&dir)?;
            writeln!(out, "{}", path.display())?;
        }

        Commands::Prompt(args) => {
            let compiled = prompt::compile(store.spec());
            let text = if args.model_config {
                serde_json::to_string_pretty(&compiled.model_config)?
            } else {
                compiled.prompt_text
            };
            emit(out, args.output.as_deref(), &text)?;
        }

        Commands::Generate(args) => {
            let client = GeminiClient::new(
                config.api_key.clone(),
                config.api_base_url.clone(),
                config.request_timeout(),
            )?;
            let mut ledger = HistoryLedger::load(storage);
            let mut orchestrator = GenerationOrchestrator::new(Box::new(client));

            let record = orchestrator.generate(store.spec(), &mut ledger).await?;

            if args.debug {
                if let Some(snapshot) = orchestrator.debug_snapshot() {
                    eprintln!("{}", serde_json::to_string_pretty(snapshot)?);
                }
            }
            emit(out, args.output.as_deref(), &record.plan)?;
        }

        Commands::History { command } => {
            let mut ledger = HistoryLedger::load(storage);
            history(command, &mut store, &mut ledger, out, confirm)?;
        }

        Commands::Options => {
            for (title, values) in catalog::sections() {
                writeln!(out, "{title}:")?;
                for value in values {
                    writeln!(out, "  - {value}")?;
                }
            }
        }
    }

    Ok(())
}

fn history(
    command: HistoryCommand,
    store: &mut ConfigStore,
    ledger: &mut HistoryLedger,
    out: &mut dyn Write,
    confirm: impl FnOnce() -> bool,
) -> anyhow::Result<()> {
    match command {
        HistoryCommand::List => {
            if ledger.is_empty() {
                writeln!(out, "No history yet.")?;
            }
            for record in ledger.records() {
                writeln!(
                    out,
                    "{}  {}  ({})",
                    record.id, record.spec.project_name, record.spec.framework
                )?;
            }
        }

        HistoryCommand::Show { id } => {
            let record = ledger
                .get(&id)
                .ok_or_else(|| PlannerError::HistoryEntryNotFound { id: id.clone() })?;
            writeln!(out, "{}", record.plan)?;
        }

        HistoryCommand::Load { id } => {
            let record = ledger
                .get(&id)
                .cloned()
                .ok_or_else(|| PlannerError::HistoryEntryNotFound { id: id.clone() })?;
            store.replace(record.spec);
            info!(record_id = %record.id, "spec restored from history");
            writeln!(out, "{}", record.plan)?;
        }

        HistoryCommand::Remove { id } => {
            if ledger.remove(&id) {
                writeln!(out, "removed {id}")?;
            } else {
                writeln!(out, "no history entry with id {id}")?;
            }
        }

        HistoryCommand::Clear { yes } => {
            if ledger.clear(|| yes || confirm()) {
                writeln!(out, "History cleared.")?;
            } else {
                writeln!(out, "Aborted.")?;
            }
        }
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Write `text` to `path` when given, otherwise to `out`.
fn emit(out: &mut dyn Write, path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = text.len(), "output written");
        }
        None => writeln!(out, "{text}")?,
    }
    Ok(())
}

fn confirm_on_stdin() -> bool {
    eprint!("{CLEAR_CONFIRMATION}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
