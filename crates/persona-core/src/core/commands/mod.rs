//! Command handlers. Each returns an [`ExecutionOutcome`]; expected failures
//! become user errors or failures with a `reason` and a `hint`, and only
//! unexpected plumbing errors surface as `Err`.

mod guard;
mod links;
mod migrate;
mod profiles;
mod status;
mod switch;

use std::path::{Path, PathBuf};

use persona_domain::normalize_path;
use serde_json::{json, Value};

use crate::guard::HookError;
use crate::identity::ApplyError;
use crate::outcome::ExecutionOutcome;
use crate::store::StoreError;

pub use guard::{guard_check, guard_install, guard_uninstall, GuardInstallRequest};
pub use links::{
    auto_switch, link_add, link_list, link_remove, resolve_path, AutoRequest, LinkRequest,
    ResolveRequest, UnlinkRequest,
};
pub use migrate::{migrate, MigrateRequest};
pub use profiles::{
    profile_add, profile_edit, profile_list, profile_remove, ProfileAddRequest, ProfileEditRequest,
    ProfileRemoveRequest,
};
pub use status::status;
pub use switch::{switch, test_ssh, SwitchRequest, TestRequest};

/// Answer from the interactive prompt collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Yes,
    No,
    /// Yes, and stop asking for this link.
    Always,
    /// No, and stop asking for this link.
    Never,
}

pub trait Prompt {
    fn confirm_switch(&self, username: &str, directory: &Path) -> PromptAnswer;
}

/// Spelling accepted by `--ssh-key` to clear a stored key.
pub const NO_SSH_KEY: &str = "none";

fn with_hint(mut details: Value, reason: &str, hint: &str) -> Value {
    if let Value::Object(map) = &mut details {
        map.insert("reason".into(), json!(reason));
        map.insert("hint".into(), json!(hint));
    }
    details
}

pub(crate) fn store_error_outcome(err: &StoreError) -> ExecutionOutcome {
    let mut details = with_hint(json!({}), err.reason(), &err.hint());
    if let StoreError::Validation(validation) = err {
        details["field"] = json!(validation.field);
    }
    match err {
        StoreError::Validation(_)
        | StoreError::AlreadyExists(_)
        | StoreError::DuplicateLink { .. }
        | StoreError::NewerFormat { .. } => ExecutionOutcome::user_error(err.to_string(), details),
        StoreError::NotFound(_)
        | StoreError::LinkNotFound(_)
        | StoreError::LockTimeout { .. }
        | StoreError::Io { .. } => {
            if let StoreError::Io { source, .. } = err {
                details["cause"] = json!(format!("{source:#}"));
            }
            ExecutionOutcome::failure(err.to_string(), details)
        }
    }
}

pub(crate) fn apply_error_outcome(err: &ApplyError) -> ExecutionOutcome {
    let mut details = with_hint(json!({}), err.reason(), &err.hint());
    match err {
        ApplyError::NoSshKey(_)
        | ApplyError::SshKeyMissing { .. }
        | ApplyError::SshKeyPermissions { .. }
        | ApplyError::NotApplied { .. } => ExecutionOutcome::user_error(err.to_string(), details),
        ApplyError::NotARepository(_) => ExecutionOutcome::failure(err.to_string(), details),
        ApplyError::Tool(source) => {
            details["cause"] = json!(format!("{source:#}"));
            ExecutionOutcome::failure(source.to_string(), details)
        }
    }
}

pub(crate) fn hook_error_outcome(err: &HookError) -> ExecutionOutcome {
    let details = with_hint(json!({}), err.reason(), &err.hint());
    match err {
        HookError::Foreign(_) | HookError::BackupExists(_) => {
            ExecutionOutcome::user_error(err.to_string(), details)
        }
        HookError::Io(_) => ExecutionOutcome::failure(format!("{err:#}"), details),
    }
}

pub(crate) fn not_a_repository_outcome(cwd: &Path) -> ExecutionOutcome {
    apply_error_outcome(&ApplyError::NotARepository(cwd.to_path_buf()))
}

/// Resolves an optional user-supplied path against the working directory.
pub(crate) fn target_dir(cwd: &Path, requested: Option<&Path>) -> PathBuf {
    normalize_path(requested.unwrap_or(cwd), cwd)
}
