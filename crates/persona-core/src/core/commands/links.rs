use std::path::PathBuf;

use anyhow::Result;
use persona_domain::{LinkMode, MatchSource};
use serde_json::json;
use tracing::{debug, info};

use super::{apply_error_outcome, store_error_outcome, target_dir, Prompt, PromptAnswer};
use crate::context::CommandContext;
use crate::effects::ConfigScope;
use crate::identity::IdentityApplier;
use crate::outcome::ExecutionOutcome;

#[derive(Clone, Debug)]
pub struct LinkRequest {
    pub username: String,
    pub path: Option<PathBuf>,
    pub mode: LinkMode,
    pub replace: bool,
}

#[derive(Clone, Debug, Default)]
pub struct UnlinkRequest {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct ResolveRequest {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct AutoRequest {
    pub scope: ConfigScope,
}

pub fn link_add(ctx: &CommandContext, request: &LinkRequest) -> Result<ExecutionOutcome> {
    let dir = target_dir(ctx.cwd(), request.path.as_deref());
    let profiles = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    if let Err(err) = profiles.get(&request.username) {
        return Ok(store_error_outcome(&err));
    }
    let mut links = match ctx.link_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let change = match links.link(&dir, &request.username, request.mode, request.replace) {
        Ok(change) => change,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    Ok(ExecutionOutcome::success(
        format!(
            "linked {} to {} ({})",
            dir.display(),
            request.username,
            request.mode
        ),
        json!({
            "path": dir,
            "username": request.username,
            "mode": request.mode,
            "change": change,
        }),
    ))
}

pub fn link_remove(ctx: &CommandContext, request: &UnlinkRequest) -> Result<ExecutionOutcome> {
    let dir = target_dir(ctx.cwd(), request.path.as_deref());
    let mut links = match ctx.link_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    match links.unlink(&dir) {
        Ok(link) => Ok(ExecutionOutcome::success(
            format!("unlinked {} from {}", link.path_prefix.display(), link.username),
            json!({ "link": link }),
        )),
        Err(err) => Ok(store_error_outcome(&err)),
    }
}

pub fn link_list(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let links = match ctx.link_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let linked = links.links();
    let legacy = links.legacy();
    let mut details = json!({ "links": linked, "legacy": legacy });
    if !legacy.is_empty() {
        details["hint"] =
            json!("run `persona migrate --adopt-project` inside a legacy project to convert it");
    }
    let message = match linked.len() {
        0 if legacy.is_empty() => "no directory links".to_string(),
        1 => "1 directory link".to_string(),
        n => format!("{n} directory links"),
    };
    Ok(ExecutionOutcome::success(message, details))
}

pub fn resolve_path(ctx: &CommandContext, request: &ResolveRequest) -> Result<ExecutionOutcome> {
    let dir = target_dir(ctx.cwd(), request.path.as_deref());
    let links = match ctx.link_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    match links.resolve(&dir) {
        Some(resolution) => Ok(ExecutionOutcome::success(
            format!("{} → {} ({})", dir.display(), resolution.username, resolution.mode),
            json!({
                "path": dir,
                "username": resolution.username,
                "mode": resolution.mode,
                "source": resolution.source,
                "matched": resolution.matched,
            }),
        )),
        None => Ok(ExecutionOutcome::failure(
            format!("no profile is assigned to {}", dir.display()),
            json!({
                "path": dir,
                "reason": "no_match",
                "hint": "run `persona link <username>` in the directory to assign one",
            }),
        )),
    }
}

/// Applies the directory's profile according to its link mode.
///
/// Meant to run on every prompt render, so the quiet paths (nothing assigned,
/// `never`, already active) all succeed.
pub fn auto_switch(
    ctx: &CommandContext,
    request: &AutoRequest,
    prompt: &dyn Prompt,
) -> Result<ExecutionOutcome> {
    let cwd = ctx.cwd().to_path_buf();
    let mut links = match ctx.link_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let Some(resolution) = links.resolve(&cwd) else {
        return Ok(skipped("no profile is assigned here", "no_match", None));
    };
    let username = resolution.username.clone();
    if resolution.mode == LinkMode::Never {
        return Ok(skipped(
            &format!("{username} is linked here with mode never"),
            "mode_never",
            Some(&username),
        ));
    }
    if request.scope == ConfigScope::Local && ctx.git().repository_root(&cwd)?.is_none() {
        return Ok(skipped(
            "not inside a git repository",
            "not_a_repository",
            Some(&username),
        ));
    }

    let profiles = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let profile = match profiles.get(&username) {
        Ok(profile) => profile.clone(),
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let applier = IdentityApplier::new(ctx.git());
    if applier.is_applied(&profile, request.scope, &cwd)? {
        debug!(%username, "profile already active");
        return Ok(skipped(
            &format!("already using {username}"),
            "already_active",
            Some(&username),
        ));
    }

    if resolution.mode == LinkMode::Ask {
        let answer = prompt.confirm_switch(&username, &resolution.matched);
        info!(%username, ?answer, "auto-switch prompt answered");
        let remember = match answer {
            PromptAnswer::Always => Some(LinkMode::Always),
            PromptAnswer::Never => Some(LinkMode::Never),
            PromptAnswer::Yes | PromptAnswer::No => None,
        };
        if let (Some(mode), MatchSource::Link) = (remember, resolution.source) {
            if let Err(err) = links.set_mode(&resolution.matched, mode) {
                return Ok(store_error_outcome(&err));
            }
        }
        if matches!(answer, PromptAnswer::No | PromptAnswer::Never) {
            return Ok(skipped(
                &format!("kept the current identity instead of {username}"),
                "declined",
                Some(&username),
            ));
        }
    }

    match applier.apply(&profile, request.scope, &cwd) {
        Ok(report) => Ok(ExecutionOutcome::success(
            format!("switched to {username} ({})", request.scope),
            json!({
                "action": "switched",
                "username": username,
                "scope": request.scope,
                "source": resolution.source,
                "apply": report,
            }),
        )),
        Err(err) => Ok(apply_error_outcome(&err)),
    }
}

fn skipped(message: &str, reason: &str, username: Option<&str>) -> ExecutionOutcome {
    ExecutionOutcome::success(
        message,
        json!({
            "action": "skipped",
            "reason": reason,
            "username": username,
        }),
    )
}
