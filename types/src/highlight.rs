use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PlaceId, TransitionId};

/// One of the two synchronized diagram views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// The token-based execution model (places and transitions).
    Net,
    /// The derived DAG projection (nodes and edges).
    Dag,
}

impl View {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            View::Net => View::Dag,
            View::Dag => View::Net,
        }
    }
}

/// A selectable element in either view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ElementRef {
    Place(PlaceId),
    Transition(TransitionId),
    DagNode(String),
    DagEdge(String),
}

impl ElementRef {
    #[must_use]
    pub const fn view(&self) -> View {
        match self {
            ElementRef::Place(_) | ElementRef::Transition(_) => View::Net,
            ElementRef::DagNode(_) | ElementRef::DagEdge(_) => View::Dag,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            ElementRef::Place(id) => id.as_str(),
            ElementRef::Transition(id) => id.as_str(),
            ElementRef::DagNode(id) | ElementRef::DagEdge(id) => id,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::Place(id) => write!(f, "place:{id}"),
            ElementRef::Transition(id) => write!(f, "transition:{id}"),
            ElementRef::DagNode(id) => write!(f, "node:{id}"),
            ElementRef::DagEdge(id) => write!(f, "edge:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    /// Self-clears after a fixed timeout.
    Transient,
    /// Remains until replaced or explicitly cleared.
    Persistent,
}

/// The currently highlighted element ids in one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSet {
    pub view: View,
    pub element_ids: BTreeSet<String>,
    pub mode: HighlightMode,
}

impl HighlightSet {
    #[must_use]
    pub fn new(view: View, element_ids: BTreeSet<String>, mode: HighlightMode) -> Self {
        Self {
            view,
            element_ids,
            mode,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.element_ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.element_ids.contains(id)
    }
}
