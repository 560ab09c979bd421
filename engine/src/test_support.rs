//! Scripted stage backend shared by the engine's unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use petriflow_stages::{
    ParseOutcome, SimulateOptions, StageBackend, StageCallError, StageFut, ValidateOptions,
};
use petriflow_types::{
    DagProjection, IntentSpec, PetriNet, SimulationResult, ValidationResult, ValidationStatus,
};
use serde_json::json;

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub(crate) calls: Mutex<Vec<&'static str>>,
    pub(crate) parse_rejections: AtomicU32,
    pub(crate) fail_dag: bool,
    pub(crate) verdict: Option<ValidationStatus>,
    pub(crate) delay: Duration,
    pub(crate) seen_seed: Mutex<Option<Option<u64>>>,
}

impl FakeBackend {
    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

pub(crate) fn sample_net() -> PetriNet {
    serde_json::from_value(json!({
        "places": [
            {"id": "p_start", "name": "start", "dagRef": "e0"},
            {"id": "p_done", "name": "done"}
        ],
        "transitions": [{"id": "t_tests", "name": "run tests", "dagRef": "n0"}],
        "arcs": [
            {"source": "p_start", "target": "t_tests"},
            {"source": "t_tests", "target": "p_done"}
        ],
        "initialMarking": {"p_start": 1}
    }))
    .unwrap()
}

pub(crate) fn sample_simulation() -> SimulationResult {
    serde_json::from_value(json!({
        "finalMarking": {"p_done": 1},
        "status": "completed",
        "trace": [{
            "stepNumber": 1,
            "timestamp": "2024-05-01T10:00:00Z",
            "eventType": "transition_fired",
            "transitionId": "t_tests",
            "transitionName": "run tests",
            "tokenMovements": {
                "removed": [{"placeId": "p_start", "tokens": 1}],
                "added": [{"placeId": "p_done", "tokens": 1}]
            }
        }]
    }))
    .unwrap()
}

impl StageBackend for FakeBackend {
    fn parse<'a>(&'a self, text: &'a str) -> StageFut<'a, ParseOutcome> {
        Box::pin(async move {
            self.enter("parse").await;
            let remaining = self.parse_rejections.load(Ordering::SeqCst);
            if remaining > 0 {
                self.parse_rejections.store(remaining - 1, Ordering::SeqCst);
                return Err(StageCallError::Rejected {
                    message: "could not find any steps".to_string(),
                    suggestions: vec!["Name at least one step.".to_string()],
                });
            }
            Ok(ParseOutcome {
                intent: IntentSpec::new(json!({"prompt": text, "steps": ["run tests"]})),
                confidence: Some(0.9),
            })
        })
    }

    fn build<'a>(&'a self, _intent: &'a IntentSpec) -> StageFut<'a, PetriNet> {
        Box::pin(async move {
            self.enter("build").await;
            Ok(sample_net())
        })
    }

    fn validate<'a>(
        &'a self,
        _net: &'a PetriNet,
        _options: &'a ValidateOptions,
    ) -> StageFut<'a, ValidationResult> {
        Box::pin(async move {
            self.enter("validate").await;
            Ok(ValidationResult {
                status: self.verdict.unwrap_or(ValidationStatus::Pass),
                checks: Default::default(),
                states_explored: 2,
                execution_time_ms: 1,
                hints: Vec::new(),
                summary_message: String::new(),
                diagnostics: Vec::new(),
            })
        })
    }

    fn simulate<'a>(
        &'a self,
        _net: &'a PetriNet,
        options: &'a SimulateOptions,
    ) -> StageFut<'a, SimulationResult> {
        Box::pin(async move {
            self.enter("simulate").await;
            *self.seen_seed.lock().unwrap() = Some(options.seed);
            Ok(sample_simulation())
        })
    }

    fn dag<'a>(&'a self, _net: &'a PetriNet) -> StageFut<'a, DagProjection> {
        Box::pin(async move {
            self.enter("dag").await;
            if self.fail_dag {
                return Err(StageCallError::Http {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(serde_json::from_value::<DagProjection>(json!({
                "nodes": [{"id": "n0", "label": "run tests", "netRef": "t_tests"}],
                "edges": []
            }))
            .unwrap())
        })
    }
}
