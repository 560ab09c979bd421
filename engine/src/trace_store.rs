//! Capped, filterable log of simulation trace events.
//!
//! Appends keep insertion order. Once the log holds more than its capacity,
//! the oldest events are evicted first. Filtering and export work on views
//! and never mutate the stored sequence.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use chrono::SecondsFormat;
use petriflow_types::TraceEvent;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// One JSON object per line.
    NdJson,
    /// A single pretty-printed JSON array.
    Json,
    Csv,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::NdJson, ExportFormat::Json, ExportFormat::Csv];

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            ExportFormat::NdJson => "ndjson",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::NdJson => "application/x-ndjson",
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    /// Parse a format name (case-insensitive). `jsonl` is accepted for ND-JSON.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ndjson" | "jsonl" => Some(ExportFormat::NdJson),
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown export format `{0}` (expected ndjson, json or csv)")]
pub struct UnknownExportFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownExportFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownExportFormat(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    /// The filtered view is empty. Reported to the user, not a hard failure.
    #[error("nothing to export")]
    NothingToExport,
    #[error("failed to serialize trace event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Event-type half of a trace filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventTypeFilter {
    #[default]
    All,
    Only(String),
}

impl EventTypeFilter {
    /// `"all"` (any case) or an empty string selects every type.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            EventTypeFilter::All
        } else {
            EventTypeFilter::Only(trimmed.to_string())
        }
    }

    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            EventTypeFilter::All => true,
            EventTypeFilter::Only(wanted) => wanted == event_type,
        }
    }
}

/// Search term plus event-type selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceFilter {
    search: String,
    pub event_type: EventTypeFilter,
}

impl TraceFilter {
    #[must_use]
    pub fn new(search: &str, event_type: EventTypeFilter) -> Self {
        Self {
            search: search.trim().to_lowercase(),
            event_type,
        }
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    #[must_use]
    pub fn matches(&self, event: &TraceEvent) -> bool {
        self.event_type.matches(&event.event_type) && self.matches_search(event)
    }

    fn matches_search(&self, event: &TraceEvent) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let hit = |field: &str| field.to_lowercase().contains(&self.search);
        event.transition_name.as_deref().is_some_and(hit)
            || event
                .transition_id
                .as_ref()
                .is_some_and(|id| hit(id.as_str()))
            || hit(&event.event_type)
    }
}

#[derive(Debug, Clone)]
pub struct TraceStore {
    events: VecDeque<TraceEvent>,
    capacity: NonZeroUsize,
    total_appended: u64,
}

impl TraceStore {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            total_appended: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Append events in order, evicting the oldest beyond capacity.
    /// Returns how many events were evicted.
    pub fn append<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        let before = self.events.len();
        let mut added = 0usize;
        for event in events {
            self.events.push_back(event);
            added += 1;
        }
        self.total_appended += added as u64;

        let mut evicted = 0;
        while self.events.len() > self.capacity.get() {
            self.events.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(
                before,
                added,
                evicted,
                capacity = self.capacity.get(),
                "Trace store evicted oldest events"
            );
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.total_appended = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events appended since the last clear, including evicted ones.
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.total_appended - self.events.len() as u64
    }

    /// Distinct event types currently stored, sorted.
    #[must_use]
    pub fn event_types(&self) -> BTreeSet<&str> {
        self.events.iter().map(|e| e.event_type.as_str()).collect()
    }

    #[must_use]
    pub fn filter(&self, filter: &TraceFilter) -> Vec<&TraceEvent> {
        self.events.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn export(&self, filter: &TraceFilter, format: ExportFormat) -> Result<String, ExportError> {
        export_events(&self.filter(filter), format)
    }
}

pub fn export_events(events: &[&TraceEvent], format: ExportFormat) -> Result<String, ExportError> {
    if events.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    match format {
        ExportFormat::NdJson => {
            let mut out = String::new();
            for event in events {
                out.push_str(&serde_json::to_string(event)?);
                out.push('\n');
            }
            Ok(out)
        }
        ExportFormat::Json => Ok(serde_json::to_string_pretty(events)?),
        ExportFormat::Csv => Ok(to_csv(events)),
    }
}

const CSV_HEADER: &str = "timestamp,stepNumber,eventType,transitionId,transitionName";

fn to_csv(events: &[&TraceEvent]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for event in events {
        let transition_id = event
            .transition_id
            .as_ref()
            .map(|id| csv_field(id.as_str()))
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            event.step_number,
            csv_field(&event.event_type),
            transition_id,
            quoted(event.transition_name.as_deref().unwrap_or_default()),
        ));
    }
    out
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quoted(value)
    } else {
        value.to_string()
    }
}
