//! Full pipeline runs against a mock stage service over HTTP

use std::sync::Arc;
use std::time::Duration;

use petriflow_config::PetriflowConfig;
use petriflow_engine::{EngineSettings, StageCompletion, StageInput, Workspace};
use petriflow_stages::HttpStageBackend;
use petriflow_stages::retry::RetryConfig;
use petriflow_types::{Stage, ValidationStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{PROMPT, mount_stage, mount_stage_service, service_url};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter_factor: 0.0,
    }
}

fn workspace_for(server: &MockServer) -> Workspace {
    let backend = HttpStageBackend::new(&service_url(server), "1.0")
        .unwrap()
        .with_retry_config(fast_retry());
    let (workspace, _commands) = Workspace::new(Arc::new(backend), EngineSettings::default());
    workspace
}

#[tokio::test]
async fn every_stage_round_trips_through_the_service() {
    let server = MockServer::start().await;
    mount_stage_service(&server, "PASS").await;
    let mut workspace = workspace_for(&server);

    for stage in Stage::ALL {
        let input = StageInput::implicit(stage).unwrap_or_else(|| StageInput::parse(PROMPT));
        let completion = workspace.run_current_stage(input).await.unwrap();
        assert!(completion.is_success(), "{stage}: {completion:?}");
        if stage != Stage::Simulate {
            workspace.advance().unwrap();
        }
    }

    let run = workspace.pipeline().snapshot();
    assert!(run.dag_projection.is_some());
    assert_eq!(
        run.validation_result.as_ref().unwrap().status,
        ValidationStatus::Pass
    );
    assert_eq!(workspace.trace().len(), 1);
}

#[tokio::test]
async fn simulate_sends_configured_options() {
    let server = MockServer::start().await;
    mount_stage_service(&server, "PASS").await;

    let mut config = PetriflowConfig::default();
    config.service.base_url = service_url(&server);
    config.simulate.max_steps = 25;
    let settings = EngineSettings::from_config(&config).unwrap();
    let backend = HttpStageBackend::from_config(&config.service).unwrap();
    let (mut workspace, _commands) = Workspace::new(Arc::new(backend), settings);

    Mock::given(method("POST"))
        .and(path("/api/v1/simulate"))
        .and(body_partial_json(json!({
            "config": {"seed": 42, "maxSteps": 25, "mode": "random", "enableTrace": true},
            "schemaVersion": "1.0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": crate::common::simulation_json()
        })))
        .expect(1)
        .named("simulate with seed 42")
        .with_priority(1)
        .mount(&server)
        .await;

    for stage in [Stage::Parse, Stage::Build, Stage::Validate] {
        let input = StageInput::implicit(stage).unwrap_or_else(|| StageInput::parse(PROMPT));
        workspace.run_current_stage(input).await.unwrap();
        workspace.advance().unwrap();
    }
    let completion = workspace
        .run_current_stage(StageInput::Simulate {
            seed: Some(42),
            max_steps: None,
        })
        .await
        .unwrap();
    assert!(completion.is_success());
}

#[tokio::test]
async fn rejected_parse_merges_service_and_local_hints() {
    let server = MockServer::start().await;
    mount_stage(
        &server,
        "parse",
        json!({
            "success": false,
            "error": {"message": "no steps found", "suggestions": ["List the steps in order."]}
        }),
    )
    .await;
    let mut workspace = workspace_for(&server);

    let completion = workspace
        .run_current_stage(StageInput::parse("hello"))
        .await
        .unwrap();

    let StageCompletion::Failed { error, .. } = completion else {
        panic!("expected a failure, got {completion:?}");
    };
    assert_eq!(error.step, Stage::Parse);
    assert_eq!(error.message, "no steps found");
    assert_eq!(error.suggestions[0], "List the steps in order.");
    assert!(error.suggestions.len() > 1);
    assert_eq!(workspace.current_stage(), Stage::Parse);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/parse"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_stage_service(&server, "PASS").await;
    let mut workspace = workspace_for(&server);

    let completion = workspace
        .run_current_stage(StageInput::parse(PROMPT))
        .await
        .unwrap();

    assert!(completion.is_success());
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].headers.get("Idempotency-Key"),
        requests[1].headers.get("Idempotency-Key")
    );
}

#[tokio::test]
async fn unreachable_service_fails_the_stage() {
    let server = MockServer::start().await;
    let url = service_url(&server);
    drop(server);

    let backend = HttpStageBackend::new(&url, "1.0")
        .unwrap()
        .with_retry_config(RetryConfig {
            max_retries: 0,
            ..fast_retry()
        });
    let (mut workspace, _commands) = Workspace::new(Arc::new(backend), EngineSettings::default());

    let completion = workspace
        .run_current_stage(StageInput::parse(PROMPT))
        .await
        .unwrap();
    assert!(!completion.is_success());
    assert!(workspace.pipeline().stage_error(Stage::Parse).is_some());
}
