use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PlaceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkingError {
    #[error("place {place} holds {available} tokens, cannot remove {requested}")]
    Insufficient {
        place: PlaceId,
        available: u32,
        requested: u32,
    },
    #[error("token count overflow at place {place}")]
    Overflow { place: PlaceId },
}

/// Token distribution across places.
///
/// Counts are unsigned, so a marking can never hold a negative count.
/// Places with zero tokens may or may not be present; lookups treat a
/// missing place as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marking(BTreeMap<PlaceId, u32>);

impl Marking {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tokens(&self, place: &PlaceId) -> u32 {
        self.0.get(place).copied().unwrap_or(0)
    }

    pub fn set(&mut self, place: PlaceId, tokens: u32) {
        self.0.insert(place, tokens);
    }

    pub fn add(&mut self, place: &PlaceId, tokens: u32) -> Result<u32, MarkingError> {
        let entry = self.0.entry(place.clone()).or_insert(0);
        *entry = entry
            .checked_add(tokens)
            .ok_or_else(|| MarkingError::Overflow {
                place: place.clone(),
            })?;
        Ok(*entry)
    }

    pub fn remove(&mut self, place: &PlaceId, tokens: u32) -> Result<u32, MarkingError> {
        let available = self.tokens(place);
        let remaining = available
            .checked_sub(tokens)
            .ok_or_else(|| MarkingError::Insufficient {
                place: place.clone(),
                available,
                requested: tokens,
            })?;
        self.0.insert(place.clone(), remaining);
        Ok(remaining)
    }

    /// Remove up to `tokens`, stopping at zero. Returns how many were removed.
    pub fn remove_saturating(&mut self, place: &PlaceId, tokens: u32) -> u32 {
        let available = self.tokens(place);
        let removed = available.min(tokens);
        self.0.insert(place.clone(), available - removed);
        removed
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|&n| u64::from(n)).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlaceId, u32)> {
        self.0.iter().map(|(place, &tokens)| (place, tokens))
    }
}

impl FromIterator<(PlaceId, u32)> for Marking {
    fn from_iter<T: IntoIterator<Item = (PlaceId, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
