//! Stage results: intent, formal model, validation verdict, DAG projection,
//! and simulation result.
//!
//! These mirror the JSON shapes returned by the analysis service. Unknown
//! fields are preserved in `extra` maps so a model can be sent back to the
//! service without losing data this client does not interpret.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Marking, PlaceId, TraceEvent, TransitionId};

/// Structured result of the parse stage. Opaque to this client apart from a
/// few read-only accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentSpec(Value);

impl IntentSpec {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Number of workflow steps the parser recognised, if it reported any.
    #[must_use]
    pub fn step_count(&self) -> Option<usize> {
        self.0
            .get("steps")
            .and_then(Value::as_array)
            .map(Vec::len)
    }
}

/// Token-based execution model produced by the build stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetriNet {
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub arcs: Vec<FlowArc>,
    #[serde(default)]
    pub initial_marking: Marking,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PetriNet {
    #[must_use]
    pub fn place(&self, id: &PlaceId) -> Option<&Place> {
        self.places.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.iter().find(|t| &t.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: PlaceId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    /// Cross-reference to the DAG edge or state marker derived from this place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dag_ref: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub id: TransitionId,
    #[serde(default)]
    pub name: String,
    /// Cross-reference to the DAG node derived from this transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dag_ref: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowArc {
    pub source: String,
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Overall verdict of the formal verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pass,
    Fail,
    Inconclusive,
}

impl ValidationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Pass => "PASS",
            ValidationStatus::Fail => "FAIL",
            ValidationStatus::Inconclusive => "INCONCLUSIVE",
        }
    }
}

/// Status of a single verifier check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Inconclusive,
    Skipped,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationChecks {
    pub deadlock: CheckStatus,
    pub reachability: CheckStatus,
    pub liveness: CheckStatus,
    pub boundedness: CheckStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub status: ValidationStatus,
    #[serde(default)]
    pub checks: ValidationChecks,
    #[serde(default)]
    pub states_explored: u64,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub summary_message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Value>,
}

impl ValidationResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Pass
    }
}

/// Derived graph view of the formal model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagProjection {
    #[serde(default)]
    pub nodes: Vec<DagNode>,
    #[serde(default)]
    pub edges: Vec<DagEdge>,
}

impl DagProjection {
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&DagNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    #[must_use]
    pub fn edge(&self, id: &str) -> Option<&DagEdge> {
        self.edges.iter().find(|e| e.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Cross-reference to the originating transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Cross-reference to the originating place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    #[serde(default)]
    pub final_marking: Marking,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub trace: Vec<TraceEvent>,
}
