//! The session-scoped workflow aggregate.

use std::fmt;
use std::sync::Arc;

use crate::{DagProjection, IntentSpec, PetriNet, SimulationResult, Stage, ValidationResult};

/// What a stage needs from earlier stages before it may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prerequisite {
    IntentSpec,
    FormalModel,
    PassingValidation,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::IntentSpec => f.write_str("a parsed intent specification"),
            Prerequisite::FormalModel => f.write_str("a built formal model"),
            Prerequisite::PassingValidation => f.write_str("a validation result with status PASS"),
        }
    }
}

/// Immutable snapshot of everything the pipeline has produced so far.
///
/// Results are reference counted so snapshots are cheap to hand to observers.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRun {
    pub prompt_text: String,
    pub intent_spec: Option<Arc<IntentSpec>>,
    pub confidence: Option<f64>,
    pub formal_model: Option<Arc<PetriNet>>,
    pub validation_result: Option<Arc<ValidationResult>>,
    pub dag_projection: Option<Arc<DagProjection>>,
    pub simulation_result: Option<Arc<SimulationResult>>,
}

impl WorkflowRun {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The progression gate for `stage`: `None` when it holds.
    #[must_use]
    pub fn unmet_prerequisite(&self, stage: Stage) -> Option<Prerequisite> {
        match stage {
            Stage::Parse => None,
            Stage::Build => self
                .intent_spec
                .is_none()
                .then_some(Prerequisite::IntentSpec),
            Stage::Validate => self
                .formal_model
                .is_none()
                .then_some(Prerequisite::FormalModel),
            Stage::Simulate => {
                let passed = self
                    .validation_result
                    .as_ref()
                    .is_some_and(|result| result.passed());
                (!passed).then_some(Prerequisite::PassingValidation)
            }
        }
    }

    #[must_use]
    pub fn gate_holds(&self, stage: Stage) -> bool {
        self.unmet_prerequisite(stage).is_none()
    }
}
