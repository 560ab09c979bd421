//! Validated runtime settings derived from [`PetriflowConfig`].

use std::num::NonZeroUsize;
use std::time::Duration;

use petriflow_config::{AnimationConfig, PetriflowConfig};
use petriflow_stages::{SimulateOptions, ValidateOptions};
use petriflow_types::{AnimationSpeed, SpeedError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Speed(#[from] SpeedError),
    #[error("trace.max_events must be at least 1")]
    ZeroTraceCapacity,
}

/// Timing inputs of the animation scheduler. Base durations are at speed 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSettings {
    pub speed: AnimationSpeed,
    pub removal_window: Duration,
    pub step_interval: Duration,
    pub pulse: Duration,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self::try_from(&AnimationConfig::default()).unwrap_or(Self {
            speed: AnimationSpeed::NORMAL,
            removal_window: Duration::from_millis(500),
            step_interval: Duration::from_millis(300),
            pulse: Duration::from_millis(600),
        })
    }
}

impl TryFrom<&AnimationConfig> for AnimationSettings {
    type Error = SpeedError;

    fn try_from(config: &AnimationConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            speed: AnimationSpeed::new(config.speed)?,
            removal_window: Duration::from_millis(config.removal_window_ms),
            step_interval: Duration::from_millis(config.step_interval_ms),
            pulse: Duration::from_millis(config.pulse_ms),
        })
    }
}

/// Options forwarded to the remote validate and simulate stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub validate: ValidateOptions,
    pub simulate: SimulateOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub pipeline: PipelineOptions,
    pub animation: AnimationSettings,
    pub trace_capacity: NonZeroUsize,
    pub hover_timeout: Duration,
}

pub const DEFAULT_TRACE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pipeline: PipelineOptions::default(),
            animation: AnimationSettings::default(),
            trace_capacity: DEFAULT_TRACE_CAPACITY,
            hover_timeout: Duration::from_millis(petriflow_config::DEFAULT_HOVER_TIMEOUT_MS),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &PetriflowConfig) -> Result<Self, SettingsError> {
        let trace_capacity =
            NonZeroUsize::new(config.trace.max_events).ok_or(SettingsError::ZeroTraceCapacity)?;
        Ok(Self {
            pipeline: PipelineOptions {
                validate: ValidateOptions::from(&config.validate),
                simulate: SimulateOptions::from(&config.simulate),
            },
            animation: AnimationSettings::try_from(&config.animation)?,
            trace_capacity,
            hover_timeout: Duration::from_millis(config.highlight.hover_timeout_ms),
        })
    }
}
