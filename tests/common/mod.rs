//! Shared test utilities and fixtures
//!
//! A scripted in-process stage backend plus helpers that mount the same
//! fixtures on a wiremock stage service.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use petriflow_stages::{
    ParseOutcome, SimulateOptions, StageBackend, StageCallError, StageFut, ValidateOptions,
};
use petriflow_types::{
    DagProjection, IntentSpec, PetriNet, SimulationResult, TraceEvent, ValidationResult,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROMPT: &str = "run tests then deploy";

pub fn intent_json() -> Value {
    json!({"steps": [{"name": "run tests"}, {"name": "deploy"}]})
}

/// Two places joined by one transition, one token on the start place.
pub fn net_json() -> Value {
    json!({
        "places": [
            {"id": "p_ready", "name": "ready", "dagRef": "e_ready"},
            {"id": "p_deployed", "name": "deployed"}
        ],
        "transitions": [
            {"id": "t_run_tests", "name": "run tests", "dagRef": "n_run_tests"}
        ],
        "arcs": [
            {"source": "p_ready", "target": "t_run_tests"},
            {"source": "t_run_tests", "target": "p_deployed"}
        ],
        "initialMarking": {"p_ready": 1}
    })
}

pub fn dag_json() -> Value {
    json!({
        "nodes": [
            {"id": "n_start", "label": "start"},
            {"id": "n_run_tests", "label": "run tests", "netRef": "t_run_tests"}
        ],
        "edges": [
            {"id": "e_ready", "source": "n_start", "target": "n_run_tests", "netRef": "p_ready"}
        ]
    })
}

pub fn validation_json(status: &str) -> Value {
    json!({
        "status": status,
        "checks": {
            "deadlock": status,
            "reachability": status,
            "liveness": status,
            "boundedness": status
        },
        "statesExplored": 2,
        "executionTimeMs": 3,
        "hints": [],
        "summaryMessage": format!("verdict {status}")
    })
}

pub fn event_json(step: u64, removed: &[(&str, u32)], added: &[(&str, u32)]) -> Value {
    let movement = |entries: &[(&str, u32)]| -> Vec<Value> {
        entries
            .iter()
            .map(|(place, tokens)| json!({"placeId": place, "tokens": tokens}))
            .collect()
    };
    json!({
        "stepNumber": step,
        "timestamp": format!("2024-05-01T10:00:{:02}Z", step % 60),
        "eventType": "transition_fired",
        "transitionId": "t_run_tests",
        "transitionName": "run tests",
        "tokenMovements": {"removed": movement(removed), "added": movement(added)}
    })
}

pub fn event(step: u64, removed: &[(&str, u32)], added: &[(&str, u32)]) -> TraceEvent {
    serde_json::from_value(event_json(step, removed, added)).unwrap()
}

pub fn simulation_json() -> Value {
    json!({
        "finalMarking": {"p_deployed": 1},
        "status": "completed",
        "trace": [event_json(1, &[("p_ready", 1)], &[("p_deployed", 1)])]
    })
}

/// In-process backend answering with the fixtures above.
pub struct ScriptedBackend {
    pub verdict: &'static str,
    pub parse_calls: AtomicUsize,
    pub remote_calls: AtomicUsize,
    pub last_seed: Mutex<Option<u64>>,
}

impl ScriptedBackend {
    pub fn passing() -> Self {
        Self::with_verdict("PASS")
    }

    pub fn with_verdict(verdict: &'static str) -> Self {
        Self {
            verdict,
            parse_calls: AtomicUsize::new(0),
            remote_calls: AtomicUsize::new(0),
            last_seed: Mutex::new(None),
        }
    }

    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl StageBackend for ScriptedBackend {
    fn parse<'a>(&'a self, _text: &'a str) -> StageFut<'a, ParseOutcome> {
        Box::pin(async move {
            self.count();
            self.parse_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ParseOutcome {
                intent: IntentSpec::new(intent_json()),
                confidence: Some(0.95),
            })
        })
    }

    fn build<'a>(&'a self, _intent: &'a IntentSpec) -> StageFut<'a, PetriNet> {
        Box::pin(async move {
            self.count();
            serde_json::from_value::<PetriNet>(net_json())
                .map_err(|e| StageCallError::Decode(e.to_string()))
        })
    }

    fn validate<'a>(
        &'a self,
        _net: &'a PetriNet,
        _options: &'a ValidateOptions,
    ) -> StageFut<'a, ValidationResult> {
        Box::pin(async move {
            self.count();
            serde_json::from_value::<ValidationResult>(validation_json(self.verdict))
                .map_err(|e| StageCallError::Decode(e.to_string()))
        })
    }

    fn simulate<'a>(
        &'a self,
        _net: &'a PetriNet,
        options: &'a SimulateOptions,
    ) -> StageFut<'a, SimulationResult> {
        Box::pin(async move {
            self.count();
            *self.last_seed.lock().unwrap() = options.seed;
            serde_json::from_value::<SimulationResult>(simulation_json())
                .map_err(|e| StageCallError::Decode(e.to_string()))
        })
    }

    fn dag<'a>(&'a self, _net: &'a PetriNet) -> StageFut<'a, DagProjection> {
        Box::pin(async move {
            self.count();
            serde_json::from_value::<DagProjection>(dag_json())
                .map_err(|e| StageCallError::Decode(e.to_string()))
        })
    }
}

/// Mount a successful response for `endpoint` under `/api/v1`.
pub async fn mount_stage(server: &MockServer, endpoint: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/{endpoint}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount every stage endpoint with the "run tests then deploy" fixtures.
pub async fn mount_stage_service(server: &MockServer, verdict: &str) {
    mount_stage(
        server,
        "parse",
        json!({"success": true, "intent": intent_json(), "confidence": 0.95}),
    )
    .await;
    mount_stage(server, "build", json!({"success": true, "petriNet": net_json()})).await;
    mount_stage(server, "dag", json!({"success": true, "dag": dag_json()})).await;
    mount_stage(
        server,
        "validate",
        json!({"success": true, "validationResult": validation_json(verdict)}),
    )
    .await;
    mount_stage(
        server,
        "simulate",
        json!({"success": true, "result": simulation_json()}),
    )
    .await;
}

pub fn service_url(server: &MockServer) -> String {
    format!("{}/api/v1", server.uri())
}
