mod common;

use common::Sandbox;

#[test]
fn add_list_edit_remove_round_trip() {
    let sandbox = Sandbox::new();
    sandbox.add("alice");

    let (code, payload) = sandbox.json(&["list"]);
    assert_eq!(code, 0);
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["details"]["profiles"][0]["username"], "alice");
    assert_eq!(payload["details"]["profiles"][0]["host"], "github.com");

    let (code, payload) = sandbox.json(&["edit", "alice", "--email", "alice@corp.example"]);
    assert_eq!(code, 0, "{payload}");
    assert_eq!(payload["details"]["profile"]["email"], "alice@corp.example");

    let stored = std::fs::read_to_string(sandbox.data_dir().join("profiles")).expect("profiles");
    assert!(stored.contains("alice@corp.example"), "{stored}");

    let (code, payload) = sandbox.json(&["remove", "alice"]);
    assert_eq!(code, 0, "{payload}");
    let (_, payload) = sandbox.json(&["list"]);
    assert_eq!(payload["details"]["profiles"], serde_json::json!([]));
}

#[test]
fn conflicts_and_invalid_fields_are_user_errors() {
    let sandbox = Sandbox::new();
    sandbox.add("alice");

    let (code, payload) = sandbox.json(&[
        "add", "alice", "--name", "Alice", "--email", "alice@example.com",
    ]);
    assert_eq!(code, 1);
    assert_eq!(payload["status"], "user-error");
    assert_eq!(payload["details"]["reason"], "profile_exists");

    let (code, payload) = sandbox.json(&["add", "bob", "--name", "Bob", "--email", "bob"]);
    assert_eq!(code, 1);
    assert_eq!(payload["details"]["reason"], "invalid_field");
    assert_eq!(payload["details"]["field"], "email");
    assert!(payload["details"]["hint"].is_string());
}

#[test]
fn missing_profiles_exit_with_two() {
    let sandbox = Sandbox::new();
    let (code, payload) = sandbox.json(&["remove", "ghost"]);
    assert_eq!(code, 2);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["details"]["reason"], "profile_not_found");
}

#[test]
fn legacy_records_are_listed_and_migrated() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(sandbox.data_dir()).expect("data dir");
    std::fs::write(
        sandbox.data_dir().join("profiles"),
        "bob=Bob B|bob@b.com\n",
    )
    .expect("seed");

    let (code, payload) = sandbox.json(&["list"]);
    assert_eq!(code, 0, "{payload}");
    assert_eq!(payload["details"]["profiles"][0]["username"], "bob");
    assert_eq!(payload["details"]["legacy"], 1);

    let (code, payload) = sandbox.json(&["migrate"]);
    assert_eq!(code, 0, "{payload}");
    assert_eq!(payload["details"]["report"]["migrated"][0]["username"], "bob");

    let (_, payload) = sandbox.json(&["list"]);
    assert_eq!(payload["details"]["legacy"], 0);
}

#[test]
fn human_output_prefixes_the_command() {
    let sandbox = Sandbox::new();
    let assert = sandbox
        .cmd()
        .args(["add", "alice", "--name", "Alice", "--email", "alice@example.com"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("persona add: added profile alice"), "{stdout}");
}
