//! Pipeline controller.
//!
//! Owns the [`WorkflowRun`] and the current [`Stage`], executes one stage at
//! a time through a [`StageBackend`], and records per-stage timing and
//! errors. Execution never advances the current stage on its own; callers
//! advance explicitly after a success.
//!
//! A stage call runs on a spawned tokio task. Completion is observed either
//! without blocking through [`PipelineController::poll_stage`] or by awaiting
//! [`PipelineController::wait_stage`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use petriflow_stages::{ParseOutcome, SimulateOptions, StageBackend, StageCallError};
use petriflow_types::{
    DagProjection, PetriNet, Prerequisite, PromptText, SimulationResult, Stage, StageError,
    StepStatus, ValidationResult, WorkflowRun,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::hints::merge_suggestions;
use crate::navigation::{GateError, NavigationError, NavigationReceipt, check_gate, navigate};
use crate::settings::PipelineOptions;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Stage-specific payload for [`PipelineController::execute_current_stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageInput {
    /// Raw natural-language description.
    Parse { text: String },
    /// Reads the parsed intent from the run.
    Build,
    /// Reads the formal model from the run.
    Validate,
    /// Optional overrides of the configured seed and step bound.
    Simulate {
        seed: Option<u64>,
        max_steps: Option<u32>,
    },
}

impl StageInput {
    #[must_use]
    pub fn parse(text: impl Into<String>) -> Self {
        StageInput::Parse { text: text.into() }
    }

    #[must_use]
    pub const fn simulate() -> Self {
        StageInput::Simulate {
            seed: None,
            max_steps: None,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            StageInput::Parse { .. } => Stage::Parse,
            StageInput::Build => Stage::Build,
            StageInput::Validate => Stage::Validate,
            StageInput::Simulate { .. } => Stage::Simulate,
        }
    }

    /// Input for stages that take nothing beyond the run's own data.
    #[must_use]
    pub const fn implicit(stage: Stage) -> Option<Self> {
        match stage {
            Stage::Parse => None,
            Stage::Build => Some(StageInput::Build),
            Stage::Validate => Some(StageInput::Validate),
            Stage::Simulate => Some(StageInput::simulate()),
        }
    }
}

/// Precondition failures detected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalValidationError {
    #[error("prompt text is empty")]
    EmptyPrompt,
    #[error("the step bound must be at least 1")]
    ZeroStepBound,
    #[error(transparent)]
    Gate(#[from] GateError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    #[error("{0} is already in flight")]
    Busy(Stage),
    #[error("input for {input} does not match the current stage {current}")]
    InputMismatch { input: Stage, current: Stage },
    #[error(transparent)]
    Local(#[from] LocalValidationError),
    #[error("nothing to retry for {0}")]
    NothingToRetry(Stage),
    #[error("no execution of {0} is in flight")]
    Idle(Stage),
}

/// Notifications for observers of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted { stage: Stage },
    StageSucceeded { stage: Stage, duration: Duration },
    StageFailed {
        error: StageError,
        duration: Option<Duration>,
    },
    StageEntered(NavigationReceipt),
    Reset,
}

/// Result of a finished stage execution.
#[derive(Debug, Clone, PartialEq)]
pub enum StageCompletion {
    Succeeded { stage: Stage, duration: Duration },
    Failed {
        stage: Stage,
        error: StageError,
        duration: Duration,
    },
}

impl StageCompletion {
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            StageCompletion::Succeeded { stage, .. } | StageCompletion::Failed { stage, .. } => {
                *stage
            }
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, StageCompletion::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Default)]
struct StageRecord {
    duration: Option<Duration>,
    error: Option<StageError>,
    succeeded: bool,
    last_input: Option<StageInput>,
}

enum StageOutput {
    Parsed {
        text: String,
        outcome: ParseOutcome,
    },
    Built {
        net: PetriNet,
        dag: Option<DagProjection>,
    },
    Validated(ValidationResult),
    Simulated(SimulationResult),
}

type StageTask = Pin<Box<dyn Future<Output = Result<StageOutput, StageCallError>> + Send>>;

struct InFlight {
    stage: Stage,
    started: Instant,
    handle: JoinHandle<Result<StageOutput, StageCallError>>,
}

pub struct PipelineController {
    backend: Arc<dyn StageBackend>,
    options: PipelineOptions,
    current: Stage,
    run: WorkflowRun,
    records: [StageRecord; 4],
    in_flight: Option<InFlight>,
    events: broadcast::Sender<PipelineEvent>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("current", &self.current)
            .field("in_flight", &self.in_flight.as_ref().map(|f| f.stage))
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl PipelineController {
    #[must_use]
    pub fn new(backend: Arc<dyn StageBackend>, options: PipelineOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            options,
            current: Stage::Parse,
            run: WorkflowRun::new(),
            records: Default::default(),
            in_flight: None,
            events,
        }
    }

    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.current
    }

    /// Cheap snapshot of every result produced so far.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowRun {
        self.run.clone()
    }

    #[must_use]
    pub fn run(&self) -> &WorkflowRun {
        &self.run
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<Stage> {
        self.in_flight.as_ref().map(|f| f.stage)
    }

    #[must_use]
    pub fn step_status(&self, stage: Stage) -> StepStatus {
        StepStatus::derive(stage, self.current, self.in_flight.is_some())
    }

    /// Elapsed time of the last finished execution of `stage`.
    #[must_use]
    pub fn stage_duration(&self, stage: Stage) -> Option<Duration> {
        self.records[stage.index()].duration
    }

    #[must_use]
    pub fn stage_error(&self, stage: Stage) -> Option<&StageError> {
        self.records[stage.index()].error.as_ref()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Start executing the current stage.
    ///
    /// Precondition failures are recorded as the stage's error and returned
    /// without contacting the backend. Must be called from within a tokio
    /// runtime.
    pub fn execute_current_stage(&mut self, input: StageInput) -> Result<(), ExecuteError> {
        if let Some(in_flight) = &self.in_flight {
            tracing::debug!(stage = %in_flight.stage, "Ignoring execution while in flight");
            return Err(ExecuteError::Busy(in_flight.stage));
        }
        let stage = self.current;
        if input.stage() != stage {
            return Err(ExecuteError::InputMismatch {
                input: input.stage(),
                current: stage,
            });
        }

        let task = match self.prepare(&input) {
            Ok(task) => task,
            Err(local) => {
                tracing::info!(stage = %stage, error = %local, "Stage rejected locally");
                let error = StageError::new(stage, local.to_string())
                    .with_suggestions(merge_suggestions(stage, Vec::new()));
                let record = &mut self.records[stage.index()];
                record.error = Some(error.clone());
                record.succeeded = false;
                self.emit(PipelineEvent::StageFailed {
                    error,
                    duration: None,
                });
                return Err(local.into());
            }
        };

        let record = &mut self.records[stage.index()];
        record.error = None;
        record.succeeded = false;
        record.last_input = Some(input);

        tracing::info!(stage = %stage, "Stage started");
        self.in_flight = Some(InFlight {
            stage,
            started: Instant::now(),
            handle: tokio::spawn(task),
        });
        self.emit(PipelineEvent::StageStarted { stage });
        Ok(())
    }

    /// Re-run the current stage with its last input, discarding its error.
    pub fn retry_stage(&mut self) -> Result<(), ExecuteError> {
        let stage = self.current;
        let input = self.records[stage.index()]
            .last_input
            .clone()
            .or_else(|| StageInput::implicit(stage))
            .ok_or(ExecuteError::NothingToRetry(stage))?;
        if self.in_flight.is_none() {
            self.records[stage.index()].error = None;
        }
        tracing::info!(stage = %stage, "Retrying stage");
        self.execute_current_stage(input)
    }

    fn prepare(&self, input: &StageInput) -> Result<StageTask, LocalValidationError> {
        let backend = Arc::clone(&self.backend);
        let stage = input.stage();
        check_gate(&self.run, stage)?;

        let task: StageTask = match input {
            StageInput::Parse { text } => {
                let prompt = PromptText::new(text.as_str())
                    .map_err(|_| LocalValidationError::EmptyPrompt)?;
                Box::pin(async move {
                    let outcome = backend.parse(prompt.as_str()).await?;
                    Ok::<_, StageCallError>(StageOutput::Parsed {
                        text: prompt.into_inner(),
                        outcome,
                    })
                })
            }
            StageInput::Build => {
                let intent = self
                    .run
                    .intent_spec
                    .clone()
                    .ok_or(GateError {
                        stage,
                        missing: Prerequisite::IntentSpec,
                    })?;
                Box::pin(async move {
                    let net = backend.build(&intent).await?;
                    let dag = match backend.dag(&net).await {
                        Ok(dag) => Some(dag),
                        Err(e) => {
                            tracing::warn!(error = %e, "DAG projection failed; continuing without it");
                            None
                        }
                    };
                    Ok::<_, StageCallError>(StageOutput::Built { net, dag })
                })
            }
            StageInput::Validate => {
                let net = self.model_for(stage)?;
                let options = self.options.validate.clone();
                Box::pin(async move {
                    let result = backend.validate(&net, &options).await?;
                    Ok::<_, StageCallError>(StageOutput::Validated(result))
                })
            }
            StageInput::Simulate { seed, max_steps } => {
                let net = self.model_for(stage)?;
                let options = SimulateOptions {
                    seed: seed.or(self.options.simulate.seed),
                    max_steps: max_steps.unwrap_or(self.options.simulate.max_steps),
                    ..self.options.simulate.clone()
                };
                if options.max_steps == 0 {
                    return Err(LocalValidationError::ZeroStepBound);
                }
                Box::pin(async move {
                    let result = backend.simulate(&net, &options).await?;
                    Ok::<_, StageCallError>(StageOutput::Simulated(result))
                })
            }
        };
        Ok(task)
    }

    fn model_for(&self, stage: Stage) -> Result<Arc<PetriNet>, GateError> {
        self.run.formal_model.clone().ok_or(GateError {
            stage,
            missing: Prerequisite::FormalModel,
        })
    }

    /// Finish the in-flight stage if its task is done, without blocking.
    pub fn poll_stage(&mut self) -> Option<StageCompletion> {
        let result = (&mut self.in_flight.as_mut()?.handle).now_or_never()?;
        let in_flight = self.in_flight.take()?;
        Some(self.complete(in_flight, result))
    }

    /// Wait for the in-flight stage. Returns `None` when nothing is in flight.
    pub async fn wait_stage(&mut self) -> Option<StageCompletion> {
        let result = (&mut self.in_flight.as_mut()?.handle).await;
        let in_flight = self.in_flight.take()?;
        Some(self.complete(in_flight, result))
    }

    fn complete(
        &mut self,
        in_flight: InFlight,
        result: Result<Result<StageOutput, StageCallError>, JoinError>,
    ) -> StageCompletion {
        let InFlight { stage, started, .. } = in_flight;
        let duration = started.elapsed();
        let record = &mut self.records[stage.index()];
        record.duration = Some(duration);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(join_error) => Err(StageCallError::Transport {
                attempts: 0,
                message: format!("stage task ended unexpectedly: {join_error}"),
            }),
        };

        match outcome {
            Ok(output) => {
                record.succeeded = true;
                record.error = None;
                self.store(output);
                tracing::info!(
                    stage = %stage,
                    elapsed = ?duration,
                    "Stage succeeded"
                );
                self.emit(PipelineEvent::StageSucceeded { stage, duration });
                StageCompletion::Succeeded { stage, duration }
            }
            Err(call_error) => {
                let mut error = call_error.into_stage_error(stage);
                error.suggestions = merge_suggestions(stage, std::mem::take(&mut error.suggestions));
                record.succeeded = false;
                record.error = Some(error.clone());
                tracing::info!(
                    stage = %stage,
                    elapsed = ?duration,
                    error = %error.message,
                    "Stage failed"
                );
                self.emit(PipelineEvent::StageFailed {
                    error: error.clone(),
                    duration: Some(duration),
                });
                StageCompletion::Failed {
                    stage,
                    error,
                    duration,
                }
            }
        }
    }

    fn store(&mut self, output: StageOutput) {
        match output {
            StageOutput::Parsed { text, outcome } => {
                self.run.prompt_text = text;
                self.run.intent_spec = Some(Arc::new(outcome.intent));
                self.run.confidence = outcome.confidence;
            }
            StageOutput::Built { net, dag } => {
                tracing::debug!(
                    places = net.places.len(),
                    transitions = net.transitions.len(),
                    arcs = net.arcs.len(),
                    "Formal model built"
                );
                self.run.formal_model = Some(Arc::new(net));
                self.run.dag_projection = dag.map(Arc::new);
                // Verdicts and traces describe the previous net.
                self.run.validation_result = None;
                self.run.simulation_result = None;
                for stage in [Stage::Validate, Stage::Simulate] {
                    self.records[stage.index()].succeeded = false;
                }
            }
            StageOutput::Validated(result) => {
                tracing::debug!(status = result.status.as_str(), "Validation verdict");
                self.run.validation_result = Some(Arc::new(result));
            }
            StageOutput::Simulated(result) => {
                tracing::debug!(
                    events = result.trace.len(),
                    status = %result.status,
                    "Simulation finished"
                );
                self.run.simulation_result = Some(Arc::new(result));
            }
        }
    }

    /// Move to `stage`. Backward moves are always allowed; forward moves need
    /// the target's progression gate. Rejected while a stage is in flight.
    pub fn go_to(&mut self, stage: Stage) -> Result<NavigationReceipt, NavigationError> {
        if let Some(in_flight) = self.in_flight() {
            return Err(NavigationError::InFlight(in_flight));
        }
        let receipt = navigate(&self.run, self.current, stage)?;
        self.current = receipt.to();
        tracing::debug!(
            from = %receipt.from(),
            to = %receipt.to(),
            edge = %receipt.edge(),
            "Stage entered"
        );
        self.emit(PipelineEvent::StageEntered(receipt));
        Ok(receipt)
    }

    /// Move to the next stage after the current one succeeded.
    pub fn advance(&mut self) -> Result<NavigationReceipt, NavigationError> {
        if let Some(in_flight) = self.in_flight() {
            return Err(NavigationError::InFlight(in_flight));
        }
        let Some(next) = self.current.next() else {
            return Err(NavigationError::AtLastStage(self.current));
        };
        if !self.records[self.current.index()].succeeded {
            return Err(NavigationError::NotCompleted(self.current));
        }
        self.go_to(next)
    }

    /// Abort any in-flight stage, empty the run and return to Parse.
    pub fn reset(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
            tracing::debug!(stage = %in_flight.stage, "Aborted in-flight stage on reset");
        }
        self.run = WorkflowRun::new();
        self.records = Default::default();
        self.current = Stage::Parse;
        tracing::info!("Pipeline reset");
        self.emit(PipelineEvent::Reset);
    }

    /// Abort the in-flight stage, if any, without recording an outcome.
    pub fn cancel_in_flight(&mut self) -> Option<Stage> {
        let in_flight = self.in_flight.take()?;
        in_flight.handle.abort();
        tracing::debug!(stage = %in_flight.stage, "Cancelled in-flight stage");
        Some(in_flight.stage)
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}
