//! Animation scheduler.
//!
//! Replays trace events as a strictly ordered stream of timed mutation
//! commands. Each observed event expands into its removal steps (no delay)
//! followed by its addition steps (delayed by the removal window). Steps are
//! queued FIFO and applied by a single dispatcher task:
//!
//! ```text
//! pop head -> sleep(step.delay) -> apply + emit command -> sleep(step.pacing) -> repeat
//! ```
//!
//! All durations are scaled by the speed in effect when a step is emitted, so
//! a speed change only affects events observed afterwards. When the queue
//! drains the dispatcher exits and the next `observe` re-arms it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use petriflow_types::{
    AnimationSpeed, AnimationStep, AnimationStepKind, ElementRef, Marking, MarkingError,
    MutationCommand, TaskId, TokenMovement, TraceEvent, TransitionId,
};
use tokio::sync::mpsc;

use crate::settings::AnimationSettings;
use crate::tasks::TaskArena;

#[derive(Debug, Default)]
struct Shared {
    queue: VecDeque<AnimationStep>,
    marking: Marking,
    /// Bumped by `stop` and `load`; a dispatcher from an older generation
    /// must not apply anything.
    generation: u64,
    dispatcher: Option<TaskId>,
    next_sequence: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Expand one event into its ordered steps. Zero-token movements are skipped.
#[must_use]
pub fn expand_event(event: &TraceEvent, settings: &AnimationSettings) -> Vec<AnimationStep> {
    let pacing = settings.speed.scale(settings.step_interval);
    let pulse = settings.speed.scale(settings.pulse);
    let addition_delay = settings.speed.scale(settings.removal_window);

    let step = |kind: AnimationStepKind, movement: &TokenMovement| -> Option<AnimationStep> {
        if movement.tokens == 0 {
            tracing::warn!(
                step = event.step_number,
                place = %movement.place_id,
                kind = kind.as_str(),
                "Skipping zero-token movement"
            );
            return None;
        }
        Some(AnimationStep {
            kind,
            place_id: movement.place_id.clone(),
            transition_id: event.transition_id.clone(),
            token_count: movement.tokens,
            delay: match kind {
                AnimationStepKind::Removal => std::time::Duration::ZERO,
                AnimationStepKind::Addition => addition_delay,
            },
            pacing,
            pulse,
            event_step: event.step_number,
        })
    };

    let movements = &event.token_movements;
    movements
        .removed
        .iter()
        .filter_map(|m| step(AnimationStepKind::Removal, m))
        .chain(
            movements
                .added
                .iter()
                .filter_map(|m| step(AnimationStepKind::Addition, m)),
        )
        .collect()
}

/// Apply a step to the animated marking, clamping removals at zero.
fn apply_step(marking: &mut Marking, step: &AnimationStep) -> u32 {
    match step.kind {
        AnimationStepKind::Removal => {
            let removed = marking.remove_saturating(&step.place_id, step.token_count);
            if removed < step.token_count {
                tracing::warn!(
                    place = %step.place_id,
                    requested = step.token_count,
                    removed,
                    "Removal clamped at zero tokens"
                );
            }
            marking.tokens(&step.place_id)
        }
        AnimationStepKind::Addition => match marking.add(&step.place_id, step.token_count) {
            Ok(tokens) => tokens,
            Err(MarkingError::Overflow { place }) => {
                tracing::warn!(place = %place, "Token count saturated");
                marking.set(place, u32::MAX);
                u32::MAX
            }
            Err(err) => {
                tracing::warn!(%err, "Unexpected marking error");
                marking.tokens(&step.place_id)
            }
        },
    }
}

fn pulses(step: &AnimationStep) -> Vec<ElementRef> {
    let mut pulses = vec![ElementRef::Place(step.place_id.clone())];
    if let Some(transition) = &step.transition_id {
        pulses.push(ElementRef::Transition(TransitionId::clone(transition)));
    }
    pulses
}

pub struct AnimationScheduler {
    settings: AnimationSettings,
    cursor: usize,
    running: bool,
    shared: Arc<Mutex<Shared>>,
    commands: mpsc::UnboundedSender<MutationCommand>,
    tasks: TaskArena,
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationScheduler")
            .field("settings", &self.settings)
            .field("cursor", &self.cursor)
            .field("running", &self.running)
            .field("queue_len", &self.queue_len())
            .finish_non_exhaustive()
    }
}

impl AnimationScheduler {
    /// A stopped scheduler and the receiving end of its command stream.
    #[must_use]
    pub fn new(settings: AnimationSettings) -> (Self, mpsc::UnboundedReceiver<MutationCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (
            Self {
                settings,
                cursor: 0,
                running: false,
                shared: Arc::default(),
                commands,
                tasks: TaskArena::new(),
            },
            rx,
        )
    }

    #[must_use]
    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    #[must_use]
    pub fn speed(&self) -> AnimationSpeed {
        self.settings.speed
    }

    /// Takes effect for events observed after this call.
    pub fn set_speed(&mut self, speed: AnimationSpeed) {
        tracing::debug!(
            from = self.settings.speed.value(),
            to = speed.value(),
            "Animation speed changed"
        );
        self.settings.speed = speed;
    }

    /// Number of trace events consumed so far.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a dispatch cycle is currently scheduled.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        let dispatcher = lock(&self.shared).dispatcher;
        dispatcher.is_some_and(|id| self.tasks.is_running(id))
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        lock(&self.shared).queue.len()
    }

    /// Token distribution after every step applied so far.
    #[must_use]
    pub fn animated_marking(&self) -> Marking {
        lock(&self.shared).marking.clone()
    }

    /// Start accepting events. A restart resumes from the cursor.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        tracing::debug!(cursor = self.cursor, "Animation scheduler started");
    }

    /// Cancel the pending timer and drop every queued step.
    ///
    /// Events observed before the stop stay consumed. Nothing is emitted
    /// after this returns.
    pub fn stop(&mut self) {
        let dropped = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.dispatcher = None;
            let dropped = shared.queue.len();
            shared.queue.clear();
            dropped
        };
        self.tasks.cancel_all();
        if self.running {
            tracing::debug!(cursor = self.cursor, dropped, "Animation scheduler stopped");
        }
        self.running = false;
    }

    /// Begin a new trace sequence: drop queued steps, rewind the cursor and
    /// seed the animated marking.
    pub fn load(&mut self, initial: Marking) {
        {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.dispatcher = None;
            shared.queue.clear();
            shared.marking = initial;
        }
        self.tasks.cancel_all();
        self.cursor = 0;
    }

    /// Consume the events of `trace` past the cursor.
    ///
    /// `trace` is the full sequence observed so far, in append order. Returns
    /// the number of steps queued. While stopped nothing is consumed, so the
    /// same events are picked up after `start`.
    pub fn observe(&mut self, trace: &[TraceEvent]) -> usize {
        if !self.running || trace.len() <= self.cursor {
            return 0;
        }

        let fresh = &trace[self.cursor..];
        let steps: Vec<AnimationStep> = fresh
            .iter()
            .flat_map(|event| expand_event(event, &self.settings))
            .collect();
        self.cursor = trace.len();
        let queued = steps.len();

        let needs_dispatcher = {
            let mut shared = lock(&self.shared);
            shared.queue.extend(steps);
            let idle = !shared
                .dispatcher
                .is_some_and(|id| self.tasks.is_running(id));
            idle && !shared.queue.is_empty()
        };

        tracing::debug!(
            events = fresh.len(),
            queued,
            cursor = self.cursor,
            "Observed trace events"
        );

        if needs_dispatcher {
            self.arm();
        }
        queued
    }

    fn arm(&mut self) {
        let shared = Arc::clone(&self.shared);
        let commands = self.commands.clone();
        let generation = lock(&self.shared).generation;

        let id = self.tasks.spawn("animation-dispatch", async move {
            dispatch(shared, commands, generation).await;
        });
        lock(&self.shared).dispatcher = Some(id);
    }
}

async fn dispatch(
    shared: Arc<Mutex<Shared>>,
    commands: mpsc::UnboundedSender<MutationCommand>,
    generation: u64,
) {
    loop {
        let step = {
            let mut guard = lock(&shared);
            if guard.generation != generation {
                return;
            }
            match guard.queue.pop_front() {
                Some(step) => step,
                None => {
                    guard.dispatcher = None;
                    tracing::debug!("Animation queue drained");
                    return;
                }
            }
        };

        tokio::time::sleep(step.delay).await;

        let command = {
            let mut guard = lock(&shared);
            if guard.generation != generation {
                return;
            }
            let place_tokens = apply_step(&mut guard.marking, &step);
            let sequence = guard.next_sequence;
            guard.next_sequence += 1;
            MutationCommand {
                sequence,
                kind: step.kind,
                place_id: step.place_id.clone(),
                transition_id: step.transition_id.clone(),
                token_count: step.token_count,
                place_tokens,
                pulses: pulses(&step),
                pulse_duration: step.pulse,
            }
        };

        if commands.send(command).is_err() {
            tracing::debug!("Mutation command receiver dropped; stopping dispatch");
            lock(&shared).dispatcher = None;
            return;
        }

        tokio::time::sleep(step.pacing).await;
    }
}

impl Drop for AnimationScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
