//! Workspace: one pipeline run wired to its trace store, animation scheduler
//! and cross-highlighting.
//!
//! The pipeline owns results; the other components only react to them. After
//! every completed stage the workspace compares result pointers and feeds
//! anything new downstream:
//!
//! - a new simulation result replaces the trace store contents and replays
//!   the trace through the scheduler from its initial marking
//! - a new formal model or DAG projection resets the highlight models

use std::sync::Arc;

use petriflow_stages::StageBackend;
use petriflow_types::{
    AnimationSpeed, DagProjection, ElementRef, HighlightSet, Marking, MutationCommand, PetriNet,
    SimulationResult, Stage,
};
use tokio::sync::{broadcast, mpsc, watch};

use crate::highlight::HighlightController;
use crate::navigation::{NavigationError, NavigationReceipt};
use crate::pipeline::{
    ExecuteError, PipelineController, PipelineEvent, StageCompletion, StageInput,
};
use crate::scheduler::AnimationScheduler;
use crate::settings::EngineSettings;
use crate::trace_store::TraceStore;

/// Result pointers last pushed downstream.
#[derive(Debug, Default)]
struct Synced {
    net: Option<Arc<PetriNet>>,
    dag: Option<Arc<DagProjection>>,
    simulation: Option<Arc<SimulationResult>>,
}

fn same<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

#[derive(Debug)]
pub struct Workspace {
    pipeline: PipelineController,
    trace: TraceStore,
    scheduler: AnimationScheduler,
    highlight: HighlightController,
    synced: Synced,
}

impl Workspace {
    /// Build a workspace and return the receiving end of the animation
    /// command stream. The scheduler starts running immediately.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StageBackend>,
        settings: EngineSettings,
    ) -> (Self, mpsc::UnboundedReceiver<MutationCommand>) {
        let (mut scheduler, commands) = AnimationScheduler::new(settings.animation);
        scheduler.start();
        let workspace = Self {
            pipeline: PipelineController::new(backend, settings.pipeline),
            trace: TraceStore::new(settings.trace_capacity),
            scheduler,
            highlight: HighlightController::new(settings.hover_timeout),
            synced: Synced::default(),
        };
        (workspace, commands)
    }

    #[must_use]
    pub fn pipeline(&self) -> &PipelineController {
        &self.pipeline
    }

    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.pipeline.current_stage()
    }

    #[must_use]
    pub fn trace(&self) -> &TraceStore {
        &self.trace
    }

    #[must_use]
    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn subscribe_pipeline(&self) -> broadcast::Receiver<PipelineEvent> {
        self.pipeline.subscribe()
    }

    #[must_use]
    pub fn subscribe_highlight(&self) -> watch::Receiver<Option<HighlightSet>> {
        self.highlight.subscribe()
    }

    /// Execute the current stage and wait for it to finish.
    pub async fn run_current_stage(
        &mut self,
        input: StageInput,
    ) -> Result<StageCompletion, ExecuteError> {
        self.pipeline.execute_current_stage(input)?;
        let completion = self
            .pipeline
            .wait_stage()
            .await
            .ok_or(ExecuteError::Idle(self.pipeline.current_stage()))?;
        self.sync_results();
        Ok(completion)
    }

    /// Start the current stage without waiting; see [`Workspace::poll`].
    pub fn start_current_stage(&mut self, input: StageInput) -> Result<(), ExecuteError> {
        self.pipeline.execute_current_stage(input)
    }

    /// Non-blocking completion check for a stage started with
    /// [`Workspace::start_current_stage`].
    pub fn poll(&mut self) -> Option<StageCompletion> {
        let completion = self.pipeline.poll_stage()?;
        self.sync_results();
        Some(completion)
    }

    pub fn retry_stage(&mut self) -> Result<(), ExecuteError> {
        self.pipeline.retry_stage()
    }

    pub fn go_to(&mut self, stage: Stage) -> Result<NavigationReceipt, NavigationError> {
        self.pipeline.go_to(stage)
    }

    pub fn advance(&mut self) -> Result<NavigationReceipt, NavigationError> {
        self.pipeline.advance()
    }

    /// Return to an empty run. Animation and highlights are cleared too.
    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.trace.clear();
        self.scheduler.load(Marking::default());
        self.highlight.clear();
        self.synced = Synced::default();
    }

    fn sync_results(&mut self) {
        let run = self.pipeline.run();

        let net_changed = !same(run.formal_model.as_ref(), self.synced.net.as_ref());
        let dag_changed = !same(run.dag_projection.as_ref(), self.synced.dag.as_ref());
        if net_changed || dag_changed {
            let net = run.formal_model.clone();
            let dag = run.dag_projection.clone();
            self.highlight.set_models(
                net.clone().unwrap_or_default(),
                dag.clone().unwrap_or_default(),
            );
            self.synced.net = net;
            self.synced.dag = dag;
        }

        let simulation = run.simulation_result.clone();
        if !same(simulation.as_ref(), self.synced.simulation.as_ref()) {
            if let Some(result) = &simulation {
                self.replay(result);
            }
            self.synced.simulation = simulation;
        }
    }

    fn replay(&mut self, result: &SimulationResult) {
        self.trace.clear();
        self.trace.append(result.trace.iter().cloned());

        let initial = self
            .synced
            .net
            .as_ref()
            .map(|net| net.initial_marking.clone())
            .filter(|marking| !marking.is_empty())
            .or_else(|| {
                result
                    .trace
                    .first()
                    .and_then(|event| event.previous_marking.clone())
            })
            .unwrap_or_default();
        self.scheduler.load(initial);
        let queued = self.scheduler.observe(&result.trace);
        tracing::info!(
            events = result.trace.len(),
            queued,
            "Replaying simulation trace"
        );
    }

    pub fn set_speed(&mut self, speed: AnimationSpeed) {
        self.scheduler.set_speed(speed);
    }

    #[must_use]
    pub fn animated_marking(&self) -> Marking {
        self.scheduler.animated_marking()
    }

    pub fn hover(&mut self, element: &ElementRef) -> Option<HighlightSet> {
        self.highlight.hover(element)
    }

    pub fn select(&mut self, element: &ElementRef) -> Option<HighlightSet> {
        self.highlight.select(element)
    }

    pub fn clear_highlight(&mut self) {
        self.highlight.clear();
    }

    #[must_use]
    pub fn highlight(&self) -> Option<HighlightSet> {
        self.highlight.current()
    }

    /// Stop animation, cancel highlight timers and abort any in-flight stage.
    pub fn teardown(&mut self) {
        self.scheduler.stop();
        self.highlight.shutdown();
        if let Some(stage) = self.pipeline.cancel_in_flight() {
            tracing::debug!(stage = %stage, "Aborted in-flight stage on teardown");
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.teardown();
    }
}
