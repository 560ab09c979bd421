//! Pipeline stages and their derived display status.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One phase of the parse -> build -> validate -> simulate pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parse,
    Build,
    Validate,
    Simulate,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Parse, Stage::Build, Stage::Validate, Stage::Simulate];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Stage::Parse => 0,
            Stage::Build => 1,
            Stage::Validate => 2,
            Stage::Simulate => 3,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Stage::Parse),
            1 => Some(Stage::Build),
            2 => Some(Stage::Validate),
            3 => Some(Stage::Simulate),
            _ => None,
        }
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Stage::Parse => None,
            Stage::Build => Some(Stage::Parse),
            Stage::Validate => Some(Stage::Build),
            Stage::Simulate => Some(Stage::Validate),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Build => "build",
            Stage::Validate => "validate",
            Stage::Simulate => "simulate",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Stage::Parse => "Parse",
            Stage::Build => "Build",
            Stage::Validate => "Validate",
            Stage::Simulate => "Simulate",
        }
    }

    /// Parse a stage name (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "parse" => Some(Stage::Parse),
            "build" => Some(Stage::Build),
            "validate" => Some(Stage::Validate),
            "simulate" => Some(Stage::Simulate),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Display status of a stage relative to the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Processing,
    Completed,
}

impl StepStatus {
    /// Derive the status of `stage` given the current stage and whether an
    /// operation is in flight for it.
    #[must_use]
    pub fn derive(stage: Stage, current: Stage, in_flight: bool) -> Self {
        match stage.index().cmp(&current.index()) {
            std::cmp::Ordering::Less => StepStatus::Completed,
            std::cmp::Ordering::Equal if in_flight => StepStatus::Processing,
            std::cmp::Ordering::Equal => StepStatus::Active,
            std::cmp::Ordering::Greater => StepStatus::Pending,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Active => "active",
            StepStatus::Processing => "processing",
            StepStatus::Completed => "completed",
        }
    }
}

/// A stage-scoped failure surfaced to the user.
///
/// Produced both for local validation failures (no remote call was issued)
/// and for remote stage failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{step} failed: {message}")]
pub struct StageError {
    pub step: Stage,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl StageError {
    #[must_use]
    pub fn new(step: Stage, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}
