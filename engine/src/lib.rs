//! Core engine for Petriflow: pipeline orchestration, animation and
//! cross-highlighting.
//!
//! This crate holds the workflow state machine without any presentation
//! dependencies. Frontends drive a [`Workspace`] and render from its
//! snapshots, the mutation command stream and the highlight channel.
//!
//! # Components
//!
//! | Component | Owns |
//! |-----------|------|
//! | [`PipelineController`] | Current stage, stage results, per-stage timing and errors |
//! | [`TraceStore`] | Bounded, filterable simulation trace with export |
//! | [`AnimationScheduler`] | Ordered replay of trace events as timed mutations |
//! | [`HighlightController`] | Net/DAG cross-highlighting with hover expiry |
//!
//! Every spawned task is owned by a component and cancelled when that
//! component is stopped or dropped.

mod highlight;
mod hints;
mod navigation;
mod pipeline;
mod scheduler;
mod settings;
mod tasks;
mod trace_store;
mod workspace;

#[cfg(test)]
mod test_support;

// ============================================================================
// Public API
// ============================================================================

pub use highlight::{HighlightController, map_selection};
pub use hints::{merge_suggestions, stage_hints};
pub use navigation::{
    GateError, NavigationEdge, NavigationError, NavigationReceipt, check_gate,
    is_legal_navigation, navigate, navigation_edge,
};
pub use pipeline::{
    ExecuteError, LocalValidationError, PipelineController, PipelineEvent, StageCompletion,
    StageInput,
};
pub use scheduler::{AnimationScheduler, expand_event};
pub use settings::{
    AnimationSettings, DEFAULT_TRACE_CAPACITY, EngineSettings, PipelineOptions, SettingsError,
};
pub use tasks::TaskArena;
pub use trace_store::{
    EventTypeFilter, ExportError, ExportFormat, TraceFilter, TraceStore, UnknownExportFormat,
    export_events,
};
pub use workspace::Workspace;

pub use petriflow_stages::{self, StageBackend};
pub use petriflow_types;
