//! GenerationOrchestrator: one compile, call, record cycle.
//!
//! State machine: `Idle -> Generating -> {Succeeded, Failed}`. Starting a new
//! generation from a terminal state clears the previous plan, error and
//! debug snapshot first. `generate` takes `&mut self`, so a second
//! generation cannot start while one is in flight.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::error::{GENERATION_FAILURE_MESSAGE, PlannerError};
use crate::ledger::{GenerationRecord, HistoryLedger};
use crate::prompt::{self, ModelConfig};
use crate::spec::ProjectSpec;

/// What the generation collaborator receives.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub config: ModelConfig,
}

/// Collaborator-side failures. All of them surface to the user as
/// [`PlannerError::GenerationFailure`]; the detail is only logged.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("response contained no text")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// External text-generation service: request in, text out, or failure.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating,
    Succeeded,
    Failed,
}

/// Config as sent, with the model name alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugConfig {
    pub model: String,
    #[serde(flatten)]
    pub model_config: ModelConfig,
}

/// Exact prompt, config and raw response of the last successful generation.
/// Kept for the current session only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    pub prompt: String,
    pub config: DebugConfig,
    pub raw_response: String,
}

pub struct GenerationOrchestrator {
    generator: Box<dyn PlanGenerator>,
    state: GenerationState,
    plan: Option<String>,
    error: Option<String>,
    debug: Option<DebugSnapshot>,
}

impl GenerationOrchestrator {
    pub fn new(generator: Box<dyn PlanGenerator>) -> Self {
        Self {
            generator,
            state: GenerationState::Idle,
            plan: None,
            error: None,
            debug: None,
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// User-facing error message of the last failed generation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn debug_snapshot(&self) -> Option<&DebugSnapshot> {
        self.debug.as_ref()
    }

    /// Compile `spec`, call the collaborator and, on success, record the
    /// result in `ledger`.
    ///
    /// Any collaborator failure becomes [`PlannerError::GenerationFailure`];
    /// nothing is recorded and no debug snapshot is kept.
    pub async fn generate(
        &mut self,
        spec: &ProjectSpec,
        ledger: &mut HistoryLedger,
    ) -> Result<GenerationRecord, PlannerError> {
        self.state = GenerationState::Generating;
        self.plan = None;
        self.error = None;
        self.debug = None;

        let compiled = prompt::compile(spec);
        let request = GenerationRequest {
            model: spec.model.clone(),
            prompt: compiled.prompt_text,
            config: compiled.model_config,
        };

        info!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            thinking = request.config.thinking_config.is_some(),
            "requesting plan"
        );

        let started = Instant::now();
        let outcome = self.generator.generate(&request).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let text = match outcome {
            Ok(text) => text,
            Err(e) => {
                error!(model = %request.model, duration_ms, err = %e, "plan generation failed");
                self.state = GenerationState::Failed;
                self.error = Some(GENERATION_FAILURE_MESSAGE.to_owned());
                return Err(PlannerError::GenerationFailure);
            }
        };

        self.debug = Some(DebugSnapshot {
            prompt: request.prompt,
            config: DebugConfig {
                model: request.model,
                model_config: request.config,
            },
            raw_response: text.clone(),
        });
        self.plan = Some(text.clone());

        let record = ledger.append(spec.clone(), text);
        self.state = GenerationState::Succeeded;
        info!(record_id = %record.id, plan_len = record.plan.len(), duration_ms, "plan generated");
        Ok(record)
    }
}
