use std::path::PathBuf;

use crate::storage::Namespace;

/// Message shown to the user for every collaborator failure. The underlying
/// cause is logged, never displayed.
pub const GENERATION_FAILURE_MESSAGE: &str =
    "Failed to generate plan. Please ensure your API key is configured correctly and try again.";

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Failed to read {namespace} record at {location}: {detail}")]
    PersistenceReadFailure {
        namespace: Namespace,
        location: String,
        detail: String,
    },

    #[error("Stored {namespace} record is corrupt: {detail}")]
    PersistenceCorrupt { namespace: Namespace, detail: String },

    #[error("Failed to write {namespace} record at {location}: {detail}")]
    PersistenceWriteFailure {
        namespace: Namespace,
        location: String,
        detail: String,
    },

    /// `message` is the user-facing notice; `detail` goes to the log.
    #[error("{message}")]
    ImportFormatInvalid {
        message: &'static str,
        detail: String,
    },

    #[error("{GENERATION_FAILURE_MESSAGE}")]
    GenerationFailure,

    #[error("Unknown spec field '{name}'")]
    UnknownField { name: String },

    #[error("Invalid value for {field}: {detail}")]
    InvalidFieldValue { field: String, detail: String },

    #[error("{field} is a list field; use `set-list` or `toggle` to change it")]
    ListFieldNeedsListEdit { field: String },

    #[error("{field} is not a list field")]
    NotAListField { field: String },

    #[error("No history entry with id {id}")]
    HistoryEntryNotFound { id: String },

    #[error("Failed to parse environment variable '{var}': {detail}")]
    ConfigEnvParseError { var: String, detail: String },

    #[error("Failed to write exported spec {path}: {detail}")]
    ExportWriteFailed { path: PathBuf, detail: String },
}
