//! Pipeline progression, gating and recovery through the workspace facade

use std::sync::Arc;
use std::sync::atomic::Ordering;

use petriflow_engine::{
    EngineSettings, ExecuteError, GateError, LocalValidationError, NavigationEdge,
    NavigationError, PipelineEvent, StageCompletion, StageInput, Workspace,
};
use petriflow_types::{
    AnimationStepKind, ElementRef, PlaceId, Prerequisite, Stage, StepStatus, TransitionId,
    ValidationStatus,
};

use crate::common::{PROMPT, ScriptedBackend};

async fn run_all(workspace: &mut Workspace, seed: Option<u64>) {
    for stage in Stage::ALL {
        let input = match stage {
            Stage::Parse => StageInput::parse(PROMPT),
            Stage::Simulate => StageInput::Simulate {
                seed,
                max_steps: None,
            },
            other => StageInput::implicit(other).unwrap(),
        };
        let completion = workspace.run_current_stage(input).await.unwrap();
        assert!(completion.is_success(), "{stage} failed: {completion:?}");
        if stage != Stage::Simulate {
            let receipt = workspace.advance().unwrap();
            assert_eq!(receipt.edge(), NavigationEdge::Advance);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn run_tests_then_deploy_end_to_end() {
    let backend = Arc::new(ScriptedBackend::passing());
    let (mut workspace, mut commands) =
        Workspace::new(backend.clone(), EngineSettings::default());

    run_all(&mut workspace, Some(42)).await;

    let run = workspace.pipeline().snapshot();
    let net = run.formal_model.as_ref().unwrap();
    assert_eq!(net.places.len(), 2);
    assert_eq!(net.transitions.len(), 1);
    assert_eq!(
        run.validation_result.as_ref().unwrap().status,
        ValidationStatus::Pass
    );
    let trace = &run.simulation_result.as_ref().unwrap().trace;
    assert_eq!(trace.len(), 1);
    assert!(trace[0].is_transition_fired());
    assert_eq!(trace[0].token_movements.removed_total(), 1);
    assert_eq!(trace[0].token_movements.added_total(), 1);
    assert_eq!(*backend.last_seed.lock().unwrap(), Some(42));

    let removal = commands.recv().await.unwrap();
    let addition = commands.recv().await.unwrap();
    assert_eq!(removal.kind, AnimationStepKind::Removal);
    assert_eq!(removal.place_id, PlaceId::new("p_ready"));
    assert_eq!(removal.delta(), -1);
    assert_eq!(addition.kind, AnimationStepKind::Addition);
    assert_eq!(addition.place_id, PlaceId::new("p_deployed"));
    assert_eq!(addition.place_tokens, 1);

    for stage in [Stage::Parse, Stage::Build, Stage::Validate] {
        assert_eq!(workspace.pipeline().step_status(stage), StepStatus::Completed);
        assert!(workspace.pipeline().stage_duration(stage).is_some());
    }
}

#[tokio::test]
async fn empty_prompt_never_reaches_the_service() {
    let backend = Arc::new(ScriptedBackend::passing());
    let (mut workspace, _commands) = Workspace::new(backend.clone(), EngineSettings::default());

    let err = workspace
        .run_current_stage(StageInput::parse(""))
        .await
        .unwrap_err();

    assert_eq!(err, ExecuteError::Local(LocalValidationError::EmptyPrompt));
    assert_eq!(backend.remote_calls(), 0);
    let error = workspace.pipeline().stage_error(Stage::Parse).unwrap();
    assert!(!error.suggestions.is_empty());
    assert_eq!(workspace.current_stage(), Stage::Parse);
}

#[tokio::test]
async fn later_stages_stay_locked_until_their_gate_holds() {
    let (mut workspace, _commands) = Workspace::new(
        Arc::new(ScriptedBackend::passing()),
        EngineSettings::default(),
    );

    assert_eq!(
        workspace.go_to(Stage::Validate).unwrap_err(),
        NavigationError::Gate(GateError {
            stage: Stage::Validate,
            missing: Prerequisite::FormalModel,
        })
    );

    workspace
        .run_current_stage(StageInput::parse(PROMPT))
        .await
        .unwrap();
    let receipt = workspace.go_to(Stage::Build).unwrap();
    assert_eq!(receipt.edge(), NavigationEdge::Advance);
    workspace.run_current_stage(StageInput::Build).await.unwrap();

    // Back to Parse, then jump straight to Validate.
    workspace.go_to(Stage::Parse).unwrap();
    let receipt = workspace.go_to(Stage::Validate).unwrap();
    assert_eq!(receipt.edge(), NavigationEdge::Jump);
}

#[tokio::test]
async fn failed_verdict_keeps_simulate_locked() {
    let (mut workspace, _commands) = Workspace::new(
        Arc::new(ScriptedBackend::with_verdict("FAIL")),
        EngineSettings::default(),
    );

    for stage in [Stage::Parse, Stage::Build] {
        let input = StageInput::implicit(stage).unwrap_or_else(|| StageInput::parse(PROMPT));
        workspace.run_current_stage(input).await.unwrap();
        workspace.advance().unwrap();
    }
    let completion = workspace
        .run_current_stage(StageInput::Validate)
        .await
        .unwrap();
    assert!(matches!(completion, StageCompletion::Succeeded { .. }));

    assert!(matches!(
        workspace.advance(),
        Err(NavigationError::Gate(GateError {
            missing: Prerequisite::PassingValidation,
            ..
        }))
    ));
    assert!(workspace.go_to(Stage::Simulate).is_err());
}

#[tokio::test]
async fn retry_reissues_the_last_prompt() {
    let backend = Arc::new(ScriptedBackend::passing());
    let (mut workspace, _commands) = Workspace::new(backend.clone(), EngineSettings::default());

    workspace
        .run_current_stage(StageInput::parse(PROMPT))
        .await
        .unwrap();
    workspace.retry_stage().unwrap();
    let mut completion = None;
    for _ in 0..100 {
        completion = workspace.poll();
        if completion.is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert!(completion.unwrap().is_success());
    assert_eq!(backend.parse_calls.load(Ordering::SeqCst), 2);
    assert_eq!(workspace.pipeline().run().prompt_text, PROMPT);
}

#[tokio::test(start_paused = true)]
async fn selections_cross_between_views() {
    let (mut workspace, _commands) = Workspace::new(
        Arc::new(ScriptedBackend::passing()),
        EngineSettings::default(),
    );
    run_all(&mut workspace, None).await;

    let from_net = workspace
        .select(&ElementRef::Place(PlaceId::new("p_ready")))
        .unwrap();
    assert!(from_net.contains("e_ready"));

    let from_dag = workspace
        .select(&ElementRef::DagNode("n_run_tests".to_string()))
        .unwrap();
    assert!(from_dag.contains("t_run_tests"));
    assert_eq!(workspace.highlight(), Some(from_dag));

    // The deployed place has no DAG counterpart.
    assert!(
        workspace
            .select(&ElementRef::Place(PlaceId::new("p_deployed")))
            .is_none()
    );
    assert!(workspace.highlight().is_none());

    assert!(
        workspace
            .hover(&ElementRef::Transition(TransitionId::new("t_run_tests")))
            .is_some()
    );
}

#[tokio::test]
async fn reset_returns_to_an_empty_run() {
    let (mut workspace, _commands) = Workspace::new(
        Arc::new(ScriptedBackend::passing()),
        EngineSettings::default(),
    );
    let mut events = workspace.subscribe_pipeline();
    workspace
        .run_current_stage(StageInput::parse(PROMPT))
        .await
        .unwrap();

    workspace.reset();

    assert!(workspace.pipeline().run().intent_spec.is_none());
    assert_eq!(workspace.current_stage(), Stage::Parse);
    let mut saw_reset = false;
    while let Ok(event) = events.try_recv() {
        saw_reset |= event == PipelineEvent::Reset;
    }
    assert!(saw_reset);
}
