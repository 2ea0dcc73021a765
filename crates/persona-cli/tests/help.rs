use assert_cmd::cargo::cargo_bin_cmd;

fn help_output(args: &[&str]) -> String {
    let assert = cargo_bin_cmd!("persona").args(args).assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 help")
}

#[test]
fn top_level_help_lists_command_groups() {
    let output = help_output(&["--help"]);
    assert!(output.contains("Per-directory git identities"), "{output}");
    for command in ["switch", "link / unlink", "auto", "guard", "migrate"] {
        assert!(output.contains(command), "missing {command}: {output}");
    }
}

#[test]
fn link_help_describes_modes() {
    let output = help_output(&["link", "--help"]);
    assert!(output.contains("--mode"), "{output}");
    assert!(output.contains("always"), "{output}");
    assert!(output.contains("--replace"), "{output}");
}

#[test]
fn usage_errors_exit_with_two() {
    cargo_bin_cmd!("persona")
        .args(["link"])
        .assert()
        .code(2);
}
