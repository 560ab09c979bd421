//! Core domain types for Petriflow.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod animation;
mod highlight;
mod ids;
mod marking;
mod model;
mod run;
mod stage;
mod trace;

pub use animation::{
    AnimationSpeed, AnimationStep, AnimationStepKind, MutationCommand, SpeedError,
};
pub use highlight::{ElementRef, HighlightMode, HighlightSet, View};
pub use ids::{PlaceId, TaskId, TransitionId};
pub use marking::{Marking, MarkingError};
pub use model::{
    CheckStatus, DagEdge, DagNode, DagProjection, FlowArc, IntentSpec, PetriNet, Place,
    SimulationResult, Transition, ValidationChecks, ValidationResult, ValidationStatus,
};
pub use run::{Prerequisite, WorkflowRun};
pub use stage::{Stage, StageError, StepStatus};
pub use trace::{
    EVENT_MARKING_CHANGED, EVENT_TRANSITION_FIRED, TokenMovement, TokenMovements, TraceEvent,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Prompt Text
// ============================================================================

/// Natural-language workflow description, guaranteed non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromptText(String);

#[derive(Debug, Error)]
#[error("prompt text must not be empty")]
pub struct EmptyPromptError;

impl PromptText {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyPromptError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyPromptError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for PromptText {
    type Error = EmptyPromptError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PromptText {
    type Error = EmptyPromptError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PromptText> for String {
    fn from(value: PromptText) -> Self {
        value.0
    }
}

impl std::ops::Deref for PromptText {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for PromptText {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
