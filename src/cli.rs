use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::spec::SpecField;

/// phplan: describe a PHP project and turn it into an LLM-generated
/// project plan.
///
/// The spec and the generation history live as JSON files in the data
/// directory and survive between invocations.
#[derive(Debug, Parser)]
#[command(name = "phplan", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand. Precedence: CLI > env > file.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GlobalArgs {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding spec.json and history.json (default: ".phplan").
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the Gemini models endpoint.
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

    /// Request timeout in seconds for plan generation (default: 300).
    #[arg(long, global = true)]
    pub timeout_sec: Option<u64>,

    /// Log level filter (default: "info"). Supports tracing directives
    /// (e.g. "debug", "phplan=trace,warn"). Overridden by PHPLAN_LOG env var.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to a log file. When set, structured JSON logs are appended here
    /// in addition to the human-readable stderr output.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the current spec as JSON.
    Show,

    /// Set a scalar field (text, number, flag or project type).
    Set(SetArgs),

    /// Replace a list field; values keep the given order.
    SetList(SetListArgs),

    /// Add a value to a list field, or remove it with --off.
    Toggle(ToggleArgs),

    /// Set the framework and merge its preset.
    Framework(FrameworkArgs),

    /// Merge a JSON spec file over the current spec.
    Import(ImportArgs),

    /// Write the current spec to <projectName>_spec.json.
    Export(ExportArgs),

    /// Print the compiled prompt without calling the model.
    Prompt(PromptArgs),

    /// Generate a project plan and record it in the history.
    Generate(GenerateArgs),

    /// Inspect or edit past generations.
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// List the catalog of selectable values.
    Options,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SetArgs {
    /// Field name, e.g. projectName, topP, use-migrations.
    pub field: SpecField,

    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SetListArgs {
    pub field: SpecField,

    /// New contents; none empties the list.
    #[arg(allow_hyphen_values = true)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ToggleArgs {
    pub field: SpecField,

    pub value: String,

    /// Remove every occurrence instead of adding.
    #[arg(long)]
    pub off: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct FrameworkArgs {
    pub name: String,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ImportArgs {
    pub file: PathBuf,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ExportArgs {
    /// Directory to write into (default: current directory).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct PromptArgs {
    /// Write the prompt to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Print the model configuration JSON instead of the prompt text.
    #[arg(long)]
    pub model_config: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct GenerateArgs {
    /// Write the plan to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Print the prompt, config and raw response as JSON to stderr.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List recorded generations, most recent first.
    List,

    /// Print the plan of one generation.
    Show { id: String },

    /// Restore the spec of one generation and print its plan.
    Load { id: String },

    /// Delete one generation.
    Remove { id: String },

    /// Delete every generation.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}
