//! End-to-end runs of the `petriflow` binary against a mock stage service

use std::process::{Command, Output};

use wiremock::MockServer;

use crate::common::{PROMPT, mount_stage_service, service_url};

async fn run_petriflow(server: &MockServer, extra: &[&str]) -> Output {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    std::fs::write(
        &config,
        format!("[service]\nbase_url = \"{}\"\n", service_url(server)),
    )
    .unwrap();

    let mut command = Command::new(env!("CARGO_BIN_EXE_petriflow"));
    command
        .arg("--config")
        .arg(&config)
        .args(["run", PROMPT, "--quiet", "--speed", "100"])
        .args(extra)
        .env("HOME", home.path())
        .env_remove("PETRIFLOW_CONFIG")
        .current_dir(home.path());

    let output = tokio::task::spawn_blocking(move || command.output())
        .await
        .unwrap()
        .unwrap();
    drop(home);
    output
}

#[tokio::test]
async fn unmatched_export_filter_is_a_notice_not_a_failure() {
    let server = MockServer::start().await;
    mount_stage_service(&server, "PASS").await;

    let output = run_petriflow(&server, &["--export", "csv", "--filter", "zzz"]).await;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("Nothing to export"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn matching_export_is_written_to_stdout() {
    let server = MockServer::start().await;
    mount_stage_service(&server, "PASS").await;

    let output = run_petriflow(&server, &["--export", "ndjson"]).await;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("t_run_tests"));
}
