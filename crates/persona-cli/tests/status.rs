mod common;

use common::Sandbox;

#[test]
fn status_reports_missing_git_as_a_warning() {
    let sandbox = Sandbox::new();
    sandbox.add("work-acct");
    let output = sandbox
        .cmd()
        .env("PERSONA_GIT", "/nonexistent/git")
        .args(["--json", "status"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["status"], "ok");
    assert!(payload["details"]["identity"]["effective"].is_null());
    assert!(!payload["details"]["warnings"]
        .as_array()
        .expect("warnings")
        .is_empty());
}

#[test]
fn unusable_configuration_exits_with_a_failure_envelope() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .cmd()
        .env("PERSONA_HOME", "relative/data")
        .args(["--json", "list"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["details"]["reason"], "setup_failed");
    assert!(payload["message"]
        .as_str()
        .is_some_and(|message| message.contains("PERSONA_HOME")));
}
