//! Remote stage clients.
//!
//! Each pipeline stage (parse, build, validate, simulate) plus the DAG
//! projection is delegated to an external analysis service. The
//! [`StageBackend`] trait is the seam the pipeline controller calls through;
//! [`HttpStageBackend`] is the production implementation and tests supply
//! scripted backends.
//!
//! # Error Handling
//!
//! A backend never panics on bad service output. Every failure is a
//! [`StageCallError`], which the pipeline turns into a stage-scoped
//! [`petriflow_types::StageError`] carrying the message and any suggestions.

pub mod http;
pub mod retry;
pub mod wire;

use std::future::Future;
use std::pin::Pin;

use petriflow_types::{
    DagProjection, IntentSpec, PetriNet, SimulationResult, Stage, StageError, ValidationResult,
};
use thiserror::Error;

pub use http::{BackendConfigError, HttpStageBackend};
pub use petriflow_types;
pub use wire::{ParseOutcome, SimulateOptions, ValidateOptions};

/// Boxed future returned by [`StageBackend`] methods.
pub type StageFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, StageCallError>> + Send + 'a>>;

/// Why a stage call produced no result.
#[derive(Debug, Error)]
pub enum StageCallError {
    /// The service answered `success: false`.
    #[error("{message}")]
    Rejected {
        message: String,
        suggestions: Vec<String>,
    },
    #[error("service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },
    #[error("unexpected response from service: {0}")]
    Decode(String),
}

impl StageCallError {
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            StageCallError::Rejected { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    /// Attach the stage this call was made for.
    #[must_use]
    pub fn into_stage_error(self, step: Stage) -> StageError {
        let message = self.to_string();
        let suggestions = match self {
            StageCallError::Rejected { suggestions, .. } => suggestions,
            _ => Vec::new(),
        };
        StageError::new(step, message).with_suggestions(suggestions)
    }
}

/// The external stage operations, one method per remote endpoint.
///
/// Implementations must be safe to share across tasks: the pipeline holds
/// the backend in an `Arc` and calls it from spawned stage tasks.
pub trait StageBackend: Send + Sync {
    fn parse<'a>(&'a self, text: &'a str) -> StageFut<'a, ParseOutcome>;

    fn build<'a>(&'a self, intent: &'a IntentSpec) -> StageFut<'a, PetriNet>;

    fn validate<'a>(
        &'a self,
        net: &'a PetriNet,
        options: &'a ValidateOptions,
    ) -> StageFut<'a, ValidationResult>;

    fn simulate<'a>(
        &'a self,
        net: &'a PetriNet,
        options: &'a SimulateOptions,
    ) -> StageFut<'a, SimulationResult>;

    fn dag<'a>(&'a self, net: &'a PetriNet) -> StageFut<'a, DagProjection>;
}
