use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Marking, PlaceId, TransitionId};

pub const EVENT_TRANSITION_FIRED: &str = "transition_fired";
pub const EVENT_MARKING_CHANGED: &str = "marking_changed";

/// One atomic, timestamped occurrence recorded during simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub step_number: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_id: Option<TransitionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_name: Option<String>,
    #[serde(default)]
    pub token_movements: TokenMovements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_marking: Option<Marking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_marking: Option<Marking>,
}

impl TraceEvent {
    #[must_use]
    pub fn is_transition_fired(&self) -> bool {
        self.event_type == EVENT_TRANSITION_FIRED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenMovements {
    pub removed: Vec<TokenMovement>,
    pub added: Vec<TokenMovement>,
}

impl TokenMovements {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    #[must_use]
    pub fn removed_total(&self) -> u64 {
        self.removed.iter().map(|m| u64::from(m.tokens)).sum()
    }

    #[must_use]
    pub fn added_total(&self) -> u64 {
        self.added.iter().map(|m| u64::from(m.tokens)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMovement {
    pub place_id: PlaceId,
    pub tokens: u32,
}

impl TokenMovement {
    #[must_use]
    pub fn new(place_id: impl Into<PlaceId>, tokens: u32) -> Self {
        Self {
            place_id: place_id.into(),
            tokens,
        }
    }
}
