use anyhow::Result;
use persona_domain::Profile;
use serde_json::json;

use super::{apply_error_outcome, not_a_repository_outcome, store_error_outcome};
use crate::context::CommandContext;
use crate::effects::ConfigScope;
use crate::identity::ssh::{key_from_ssh_command, probe};
use crate::identity::IdentityApplier;
use crate::outcome::ExecutionOutcome;

#[derive(Clone, Debug)]
pub struct SwitchRequest {
    pub username: String,
    pub scope: ConfigScope,
    /// Store the identity currently configured at `scope` into the profile first.
    pub capture: bool,
}

#[derive(Clone, Debug)]
pub struct TestRequest {
    pub username: String,
}

pub fn switch(ctx: &CommandContext, request: &SwitchRequest) -> Result<ExecutionOutcome> {
    let mut store = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let applier = IdentityApplier::new(ctx.git());

    let mut captured = false;
    if request.capture {
        if request.scope == ConfigScope::Local && ctx.git().repository_root(ctx.cwd())?.is_none() {
            return Ok(not_a_repository_outcome(ctx.cwd()));
        }
        let current = applier.current(ctx.cwd(), Some(request.scope))?;
        let (Some(name), Some(email)) = (current.name, current.email) else {
            return Ok(ExecutionOutcome::user_error(
                format!("no {} git identity to capture", request.scope),
                json!({
                    "reason": "nothing_to_capture",
                    "hint": "set user.name and user.email first, or drop --capture",
                }),
            ));
        };
        let mut profile = store
            .find(&request.username)
            .cloned()
            .unwrap_or_else(|| Profile::new(&request.username, "", ""));
        profile.display_name = name;
        profile.email = email;
        profile.ssh_key_path = current
            .ssh_command
            .as_deref()
            .and_then(key_from_ssh_command);
        if let Err(err) = store.put(profile) {
            return Ok(store_error_outcome(&err));
        }
        captured = true;
    }

    let profile = match store.get(&request.username) {
        Ok(profile) => profile.clone(),
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let report = match applier.apply(&profile, request.scope, ctx.cwd()) {
        Ok(report) => report,
        Err(err) => return Ok(apply_error_outcome(&err)),
    };

    let warnings: Vec<String> = report
        .shadowed
        .iter()
        .map(|key| format!("{key} is overridden by this repository's local config"))
        .collect();
    let message = if report.is_noop() {
        format!("already using {} ({})", profile.username, request.scope)
    } else {
        format!("switched to {} ({})", profile.username, request.scope)
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "username": profile.username,
            "scope": request.scope,
            "captured": captured,
            "apply": report,
            "warnings": warnings,
        }),
    ))
}

pub fn test_ssh(ctx: &CommandContext, request: &TestRequest) -> Result<ExecutionOutcome> {
    let store = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let profile = match store.get(&request.username) {
        Ok(profile) => profile,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let report = match probe(ctx.ssh(), profile, ctx.config().ssh_timeout()) {
        Ok(report) => report,
        Err(err) => return Ok(apply_error_outcome(&err)),
    };

    match report.login.as_deref() {
        Some(_) if report.matches => Ok(ExecutionOutcome::success(
            format!("{} authenticates to {} as expected", profile.username, profile.host),
            json!({ "ssh": report }),
        )),
        Some(login) => Ok(ExecutionOutcome::user_error(
            format!(
                "key for {} authenticates to {} as `{login}`",
                profile.username, profile.host
            ),
            json!({
                "ssh": report,
                "reason": "ssh_login_mismatch",
                "hint": "the key is registered to another account; add the right key to this account",
            }),
        )),
        None => Ok(ExecutionOutcome::failure(
            format!("SSH authentication to {} failed", profile.host),
            json!({
                "ssh": report,
                "reason": "ssh_auth_failed",
                "hint": "check the key is added to the account and the host is reachable",
            }),
        )),
    }
}
