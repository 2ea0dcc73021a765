#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// An isolated data directory, git config and working directory per test.
pub struct Sandbox {
    pub home: TempDir,
    pub work: TempDir,
    gh: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let home = tempfile::Builder::new()
            .prefix("persona-home")
            .tempdir()
            .expect("home");
        let work = tempfile::Builder::new()
            .prefix("persona-work")
            .tempdir()
            .expect("work");
        let gh = home.path().join("missing-gh");
        Self { home, work, gh }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.home.path().join("data")
    }

    /// Replaces the GitHub CLI with a script that reports `login`, or no login for `None`.
    pub fn fake_gh(&mut self, login: Option<&str>) {
        let script = self.home.path().join("gh");
        let body = match login {
            Some(login) => format!(
                "#!/bin/sh\necho 'github.com'\necho '  Logged in to github.com account {login} (keyring)'\n"
            ),
            None => "#!/bin/sh\necho 'not logged in' >&2\nexit 1\n".to_string(),
        };
        fs::write(&script, body).expect("gh script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
        }
        self.gh = script;
    }

    pub fn cmd(&self) -> Command {
        self.cmd_in(self.work.path())
    }

    pub fn cmd_in(&self, dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("persona");
        cmd.current_dir(dir)
            .env("PERSONA_HOME", self.data_dir())
            .env("PERSONA_GH", &self.gh)
            .env("HOME", self.home.path())
            .env("GIT_CONFIG_GLOBAL", self.home.path().join(".gitconfig"))
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("NO_COLOR", "1")
            .env_remove("PERSONA_GUARD_SKIP");
        cmd
    }

    /// Runs with `--json` and returns the exit code and parsed envelope.
    pub fn json(&self, args: &[&str]) -> (i32, Value) {
        self.json_in(self.work.path(), args)
    }

    pub fn json_in(&self, dir: &Path, args: &[&str]) -> (i32, Value) {
        let output = self
            .cmd_in(dir)
            .arg("--json")
            .args(args)
            .output()
            .expect("run persona");
        let payload: Value = serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
            panic!(
                "invalid json ({err}): {}\nstderr: {}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
        });
        (output.status.code().unwrap_or(-1), payload)
    }

    pub fn add(&self, username: &str) {
        let (code, payload) = self.json(&[
            "add",
            username,
            "--name",
            &format!("{username} dev"),
            "--email",
            &format!("{username}@example.com"),
        ]);
        assert_eq!(code, 0, "{payload}");
    }

    pub fn git(&self, dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .current_dir(dir)
            .env("HOME", self.home.path())
            .env("GIT_CONFIG_GLOBAL", self.home.path().join(".gitconfig"))
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .args(args)
            .output()
            .expect("run git");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    pub fn init_repo(&self) {
        self.git(self.work.path(), &["init", "--quiet"]);
    }
}

pub fn git_available() -> bool {
    StdCommand::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}
