//! Stage navigation authority.
//!
//! This module is the single encoding point for which stage moves exist and
//! when they are legal. The pipeline controller delegates every `go_to` and
//! `advance` decision here instead of embedding the rules at call sites.

use std::fmt;

use petriflow_types::{Prerequisite, Stage, WorkflowRun};
use thiserror::Error;

/// Shape of a stage move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationEdge {
    /// Back to an earlier stage. Always allowed.
    Retreat,
    /// Re-selecting the current stage. Always allowed.
    Stay,
    /// To the stage directly after the current one.
    Advance,
    /// To a later stage, skipping at least one.
    Jump,
}

impl fmt::Display for NavigationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NavigationEdge::Retreat => "retreat",
            NavigationEdge::Stay => "stay",
            NavigationEdge::Advance => "advance",
            NavigationEdge::Jump => "jump",
        })
    }
}

/// A progression gate that did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{stage} requires {missing}")]
pub struct GateError {
    pub stage: Stage,
    pub missing: Prerequisite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("cannot change stage while {0} is in flight")]
    InFlight(Stage),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("{0} has not completed successfully yet")]
    NotCompleted(Stage),
    #[error("{0} is the last stage")]
    AtLastStage(Stage),
}

/// Proof that a stage move was checked and taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationReceipt {
    from: Stage,
    edge: NavigationEdge,
    to: Stage,
}

impl NavigationReceipt {
    #[must_use]
    pub const fn from(self) -> Stage {
        self.from
    }

    #[must_use]
    pub const fn edge(self) -> NavigationEdge {
        self.edge
    }

    #[must_use]
    pub const fn to(self) -> Stage {
        self.to
    }
}

#[must_use]
pub fn navigation_edge(from: Stage, to: Stage) -> NavigationEdge {
    use std::cmp::Ordering;

    match to.index().cmp(&from.index()) {
        Ordering::Less => NavigationEdge::Retreat,
        Ordering::Equal => NavigationEdge::Stay,
        Ordering::Greater if from.next() == Some(to) => NavigationEdge::Advance,
        Ordering::Greater => NavigationEdge::Jump,
    }
}

#[must_use]
pub fn is_legal_navigation(from: Stage, edge: NavigationEdge, to: Stage) -> bool {
    navigation_edge(from, to) == edge
}

pub fn check_gate(run: &WorkflowRun, stage: Stage) -> Result<(), GateError> {
    match run.unmet_prerequisite(stage) {
        None => Ok(()),
        Some(missing) => Err(GateError { stage, missing }),
    }
}

/// Decide whether `from -> to` may be taken given the run's results.
///
/// Backward and same-stage moves are always legal. Forward moves require the
/// target's progression gate.
pub fn navigate(
    run: &WorkflowRun,
    from: Stage,
    to: Stage,
) -> Result<NavigationReceipt, NavigationError> {
    let edge = navigation_edge(from, to);
    if matches!(edge, NavigationEdge::Advance | NavigationEdge::Jump) {
        check_gate(run, to)?;
    }
    debug_assert!(is_legal_navigation(from, edge, to));
    Ok(NavigationReceipt { from, edge, to })
}
