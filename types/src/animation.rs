//! Primitive animation steps and the mutation commands they produce.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ElementRef, PlaceId, TransitionId};

/// Playback rate multiplier, within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct AnimationSpeed(f64);

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error(
    "animation speed must be between {min} and {max} (got {0})",
    min = AnimationSpeed::MIN.0,
    max = AnimationSpeed::MAX.0
)]
pub struct SpeedError(pub f64);

impl AnimationSpeed {
    pub const NORMAL: AnimationSpeed = AnimationSpeed(1.0);
    pub const MIN: AnimationSpeed = AnimationSpeed(0.01);
    pub const MAX: AnimationSpeed = AnimationSpeed(100.0);

    pub fn new(value: f64) -> Result<Self, SpeedError> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SpeedError(value))
        }
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Compress (or stretch) a base duration by this speed. Saturates at
    /// `Duration::MAX`.
    #[must_use]
    pub fn scale(self, base: Duration) -> Duration {
        Duration::try_from_secs_f64(base.as_secs_f64() / self.0).unwrap_or(Duration::MAX)
    }
}

impl Default for AnimationSpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationStepKind {
    Removal,
    Addition,
}

impl AnimationStepKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AnimationStepKind::Removal => "removal",
            AnimationStepKind::Addition => "addition",
        }
    }
}

/// A primitive, individually timed visual mutation derived from a trace event.
///
/// `delay` and `pacing` are already scaled by the speed in effect when the
/// step was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationStep {
    pub kind: AnimationStepKind,
    pub place_id: PlaceId,
    pub transition_id: Option<TransitionId>,
    pub token_count: u32,
    /// Wait before the step is applied, relative to the start of its cycle.
    pub delay: Duration,
    /// Wait after the step is applied before the next cycle begins.
    pub pacing: Duration,
    /// Length of the visual pulse on the place and firing transition.
    pub pulse: Duration,
    /// Step number of the originating trace event.
    pub event_step: u64,
}

/// Rendering-agnostic instruction emitted when an animation step is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationCommand {
    /// Position in the dispatch order, starting at zero for a session.
    pub sequence: u64,
    pub kind: AnimationStepKind,
    pub place_id: PlaceId,
    pub transition_id: Option<TransitionId>,
    pub token_count: u32,
    /// Token count at the place after the mutation.
    pub place_tokens: u32,
    /// Elements to pulse: the place, then the firing transition when known.
    pub pulses: Vec<ElementRef>,
    pub pulse_duration: Duration,
}

impl MutationCommand {
    /// Signed token delta for the place.
    #[must_use]
    pub fn delta(&self) -> i64 {
        match self.kind {
            AnimationStepKind::Removal => -i64::from(self.token_count),
            AnimationStepKind::Addition => i64::from(self.token_count),
        }
    }
}
