//! Pushing a profile into git configuration, and checking its SSH key works.

mod apply;
pub mod ssh;

use std::path::PathBuf;

pub use apply::{ApplyReport, ConfigChange, GitIdentity, IdentityApplier, KEY_EMAIL, KEY_NAME, KEY_SSH};

#[derive(thiserror::Error, Debug)]
pub enum ApplyError {
    #[error("{} is not inside a git repository", .0.display())]
    NotARepository(PathBuf),
    #[error("profile `{0}` has no SSH key")]
    NoSshKey(String),
    #[error("SSH key {} does not exist", .path.display())]
    SshKeyMissing { path: PathBuf },
    #[error("SSH key {} is accessible by other users (mode {mode:03o})", .path.display())]
    SshKeyPermissions { path: PathBuf, mode: u32 },
    #[error("git did not keep {key}: expected {expected}, found {found}")]
    NotApplied {
        key: &'static str,
        expected: String,
        found: String,
    },
    #[error(transparent)]
    Tool(#[from] anyhow::Error),
}

impl ApplyError {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ApplyError::NotARepository(_) => "not_a_repository",
            ApplyError::NoSshKey(_) => "no_ssh_key",
            ApplyError::SshKeyMissing { .. } => "ssh_key_missing",
            ApplyError::SshKeyPermissions { .. } => "ssh_key_permissions",
            ApplyError::NotApplied { .. } => "not_applied",
            ApplyError::Tool(_) => "tool_failed",
        }
    }

    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            ApplyError::NotARepository(_) => {
                "Run inside a repository, or drop `--local` to switch globally.".to_string()
            }
            ApplyError::NoSshKey(username) => {
                format!("Set one with `persona edit {username} --ssh-key <path>`.")
            }
            ApplyError::SshKeyMissing { .. } => {
                "Fix the key path, or clear it with `persona edit <user> --ssh-key none`."
                    .to_string()
            }
            ApplyError::SshKeyPermissions { path, .. } => {
                format!("Run `chmod 600 {}`.", path.display())
            }
            ApplyError::NotApplied { key, .. } => format!(
                "Another config file overrides {key}; check `git config --show-origin --get {key}` for includeIf rules."
            ),
            ApplyError::Tool(_) => {
                "Make sure git and ssh are installed, or point PERSONA_GIT / PERSONA_SSH at them."
                    .to_string()
            }
        }
    }
}
