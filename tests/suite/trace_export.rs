//! Trace store retention, filtering and export formats

use std::num::NonZeroUsize;

use petriflow_engine::{EventTypeFilter, ExportError, ExportFormat, TraceFilter, TraceStore};
use petriflow_types::TraceEvent;
use serde_json::Value;

use crate::common::event;

fn store_with(capacity: usize, count: u64) -> TraceStore {
    let mut store = TraceStore::new(NonZeroUsize::new(capacity).unwrap());
    for step in 1..=count {
        store.append([event(step, &[("p_ready", 1)], &[("p_deployed", 1)])]);
    }
    store
}

#[test]
fn oldest_events_are_evicted_beyond_capacity() {
    let store = store_with(3, 5);

    assert_eq!(store.len(), 3);
    assert_eq!(store.evicted(), 2);
    assert_eq!(store.total_appended(), 5);
    let steps: Vec<u64> = store.iter().map(|e| e.step_number).collect();
    assert_eq!(steps, vec![3, 4, 5]);
}

#[test]
fn ndjson_and_json_carry_the_same_events() {
    let store = store_with(10, 2);
    let filter = TraceFilter::default();

    let ndjson = store.export(&filter, ExportFormat::NdJson).unwrap();
    let lines: Vec<&str> = ndjson.lines().collect();
    assert_eq!(lines.len(), 2);
    let from_lines: Vec<TraceEvent> = lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let json = store.export(&filter, ExportFormat::Json).unwrap();
    let array: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(array.as_array().unwrap().len(), 2);
    let from_array: Vec<TraceEvent> = serde_json::from_value(array).unwrap();

    assert_eq!(from_lines, from_array);
    assert_eq!(from_lines[1].step_number, 2);
}

#[test]
fn csv_has_fixed_columns_and_quoted_names() {
    let store = store_with(10, 1);
    let csv = store
        .export(&TraceFilter::default(), ExportFormat::Csv)
        .unwrap();

    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,stepNumber,eventType,transitionId,transitionName")
    );
    assert_eq!(
        lines.next(),
        Some("2024-05-01T10:00:01Z,1,transition_fired,t_run_tests,\"run tests\"")
    );
    assert_eq!(lines.next(), None);
}

#[test]
fn filters_narrow_the_export() {
    let store = store_with(10, 3);

    let by_search = TraceFilter::new("RUN TESTS", EventTypeFilter::All);
    assert_eq!(store.filter(&by_search).len(), 3);

    let by_type = TraceFilter::new("", EventTypeFilter::parse("marking_changed"));
    assert!(store.filter(&by_type).is_empty());
    assert!(matches!(
        store.export(&by_type, ExportFormat::Json),
        Err(ExportError::NothingToExport)
    ));

    assert_eq!(
        store.event_types().into_iter().collect::<Vec<_>>(),
        vec!["transition_fired"]
    );
}

#[test]
fn export_format_names_and_metadata() {
    assert_eq!("jsonl".parse::<ExportFormat>().unwrap(), ExportFormat::NdJson);
    assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    assert!("xml".parse::<ExportFormat>().is_err());
    assert_eq!(ExportFormat::Csv.mime_type(), "text/csv");
    assert_eq!(ExportFormat::Json.extension(), "json");
}
