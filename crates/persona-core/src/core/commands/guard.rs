use std::path::PathBuf;

use anyhow::Result;
use persona_domain::DEFAULT_HOST;
use serde_json::json;

use super::{hook_error_outcome, not_a_repository_outcome, store_error_outcome};
use crate::context::CommandContext;
use crate::guard::{hook, GuardReport, GuardValidator};
use crate::outcome::ExecutionOutcome;
use crate::store::StoreError;

#[derive(Clone, Debug, Default)]
pub struct GuardInstallRequest {
    /// Move a foreign pre-commit hook aside instead of refusing.
    pub force: bool,
}

/// Runs the guard for the context's working directory.
///
/// The bypass toggle is honoured before either store is read.
pub(crate) fn evaluate(ctx: &CommandContext) -> Result<GuardReport, StoreError> {
    if ctx.config().guard_bypass() {
        let assigned = ctx
            .link_store()
            .ok()
            .and_then(|links| links.resolve(ctx.cwd()))
            .map(|resolution| resolution.username);
        return Ok(GuardReport::bypassed(assigned));
    }
    let links = ctx.link_store()?;
    let resolution = links.resolve(ctx.cwd());
    let host = match &resolution {
        Some(resolution) => ctx
            .profile_store()?
            .find(&resolution.username)
            .map_or_else(|| DEFAULT_HOST.to_string(), |profile| profile.host.clone()),
        None => DEFAULT_HOST.to_string(),
    };
    Ok(GuardValidator::new(ctx.config().guard_bypass()).check(
        resolution.as_ref(),
        &host,
        |host| ctx.current_login(host),
    ))
}

pub fn guard_check(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let report = match evaluate(ctx) {
        Ok(report) => report,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    if report.allow {
        let message = report.message.clone();
        return Ok(ExecutionOutcome::success(message, json!({ "guard": report })));
    }
    let assigned = report.assigned.clone().unwrap_or_default();
    Ok(ExecutionOutcome::user_error(
        format!("commit blocked: {}", report.message),
        json!({
            "guard": report,
            "reason": "identity_mismatch",
            "hint": format!(
                "run `gh auth switch` to log in as `{assigned}`, or set PERSONA_GUARD_SKIP=1 to commit anyway"
            ),
        }),
    ))
}

fn hooks_dir(ctx: &CommandContext) -> Result<Option<PathBuf>> {
    ctx.git().hooks_dir(ctx.cwd())
}

pub fn guard_install(ctx: &CommandContext, request: &GuardInstallRequest) -> Result<ExecutionOutcome> {
    let Some(dir) = hooks_dir(ctx)? else {
        return Ok(not_a_repository_outcome(ctx.cwd()));
    };
    let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("persona"));
    match hook::install(&dir, &program, request.force) {
        Ok(install) => {
            let message = match install.action {
                hook::InstallAction::Unchanged => "guard hook already installed",
                hook::InstallAction::Updated => "updated the guard hook",
                hook::InstallAction::Installed => "installed the guard hook",
                hook::InstallAction::Replaced => "installed the guard hook; the previous hook was backed up",
            };
            Ok(ExecutionOutcome::success(message, json!({ "hook": install })))
        }
        Err(err) => Ok(hook_error_outcome(&err)),
    }
}

pub fn guard_uninstall(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let Some(dir) = hooks_dir(ctx)? else {
        return Ok(not_a_repository_outcome(ctx.cwd()));
    };
    match hook::uninstall(&dir) {
        Ok(removal) => {
            let message = match (removal.removed, removal.restored.is_some()) {
                (false, _) => "no guard hook installed",
                (true, true) => "removed the guard hook and restored the previous one",
                (true, false) => "removed the guard hook",
            };
            Ok(ExecutionOutcome::success(message, json!({ "hook": removal })))
        }
        Err(err) => Ok(hook_error_outcome(&err)),
    }
}
