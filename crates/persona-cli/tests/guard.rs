mod common;

use common::Sandbox;

fn linked_sandbox() -> Sandbox {
    let sandbox = Sandbox::new();
    sandbox.add("work-acct");
    let (code, payload) = sandbox.json(&["link", "work-acct"]);
    assert_eq!(code, 0, "{payload}");
    sandbox
}

#[test]
#[cfg(unix)]
fn mismatched_login_blocks_the_commit() {
    let mut sandbox = linked_sandbox();
    sandbox.fake_gh(Some("personal"));
    let (code, payload) = sandbox.json(&["guard", "check"]);
    assert_eq!(code, 1, "{payload}");
    assert_eq!(payload["details"]["guard"]["state"], "mismatched");
    let message = payload["message"].as_str().expect("message");
    assert!(message.contains("work-acct") && message.contains("personal"), "{message}");
    assert!(payload["details"]["hint"]
        .as_str()
        .is_some_and(|hint| hint.contains("PERSONA_GUARD_SKIP")));
}

#[test]
#[cfg(unix)]
fn matching_login_allows_the_commit() {
    let mut sandbox = linked_sandbox();
    sandbox.fake_gh(Some("Work-Acct"));
    let (code, payload) = sandbox.json(&["guard", "check"]);
    assert_eq!(code, 0, "{payload}");
    assert_eq!(payload["details"]["guard"]["state"], "matched");
}

#[test]
#[cfg(unix)]
fn bypass_allows_a_mismatch() {
    let mut sandbox = linked_sandbox();
    sandbox.fake_gh(Some("personal"));
    let output = sandbox
        .cmd()
        .env("PERSONA_GUARD_SKIP", "1")
        .args(["--json", "guard", "check"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["details"]["guard"]["bypassed"], true);
}

#[test]
fn unassigned_or_unauthenticated_directories_are_allowed() {
    let sandbox = Sandbox::new();
    let (code, payload) = sandbox.json(&["guard", "check"]);
    assert_eq!(code, 0, "{payload}");
    assert_eq!(payload["details"]["guard"]["state"], "no-assignment");

    let sandbox = linked_sandbox();
    let (code, payload) = sandbox.json(&["guard", "check"]);
    assert_eq!(code, 0, "{payload}");
    assert_eq!(payload["details"]["guard"]["state"], "unauthenticated");
}

#[test]
fn bypass_holds_when_the_links_file_cannot_be_read() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(sandbox.data_dir().join("links")).expect("links dir");

    let (code, payload) = sandbox.json(&["guard", "check"]);
    assert_eq!(code, 2, "{payload}");

    let output = sandbox
        .cmd()
        .env("PERSONA_GUARD_SKIP", "1")
        .args(["--json", "guard", "check"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["details"]["guard"]["bypassed"], true);
}
