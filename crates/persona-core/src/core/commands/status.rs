use anyhow::Result;
use serde_json::{json, Value};
use tracing::warn;

use super::{guard::evaluate, store_error_outcome};
use crate::context::CommandContext;
use crate::effects::ConfigScope;
use crate::guard::hook::{is_persona_hook, HOOK_NAME};
use crate::identity::{GitIdentity, IdentityApplier};
use crate::outcome::ExecutionOutcome;

fn identity_details(identity: Option<&GitIdentity>) -> Value {
    identity.map_or(Value::Null, |identity| {
        json!({
            "name": identity.name,
            "email": identity.email,
            "ssh_command": identity.ssh_command,
        })
    })
}

/// Keeps an informational read going when git cannot answer.
fn or_warn<T>(result: Result<T>, what: &str, warnings: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%err, "could not read {what}");
            warnings.push(format!("could not read {what}: {err}"));
            None
        }
    }
}

/// Summarizes who the working directory belongs to and who git and `gh` currently are.
pub fn status(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let profiles = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let links = match ctx.link_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let mut warnings = Vec::new();
    let resolution = links.resolve(ctx.cwd());
    let assigned = resolution
        .as_ref()
        .and_then(|hit| profiles.find(&hit.username));
    if let (Some(hit), None) = (&resolution, assigned) {
        warnings.push(format!(
            "{} is linked to `{}`, which is not a stored profile",
            hit.matched.display(),
            hit.username
        ));
    }

    let applier = IdentityApplier::new(ctx.git());
    let repository = or_warn(
        ctx.git().repository_root(ctx.cwd()),
        "the repository root",
        &mut warnings,
    )
    .flatten();
    let effective = or_warn(
        applier.current(ctx.cwd(), None),
        "the active git identity",
        &mut warnings,
    );
    let global = or_warn(
        applier.current(ctx.cwd(), Some(ConfigScope::Global)),
        "the global git identity",
        &mut warnings,
    );
    let active = effective.as_ref().and_then(|effective| {
        profiles
            .list()
            .find(|profile| effective.matches(profile))
            .map(|profile| profile.username.clone())
    });

    let host = assigned.map_or(persona_domain::DEFAULT_HOST, |profile| profile.host.as_str());
    let login = match ctx.current_login(host) {
        Ok(login) => login,
        Err(err) => {
            warn!(%host, %err, "GitHub CLI login unavailable");
            warnings.push(format!("could not ask the GitHub CLI who is logged in: {err}"));
            None
        }
    };
    let guard = match evaluate(ctx) {
        Ok(report) => report,
        Err(err) => return Ok(store_error_outcome(&err)),
    };

    let hook_installed = match ctx.git().hooks_dir(ctx.cwd()) {
        Ok(Some(dir)) => std::fs::read_to_string(dir.join(HOOK_NAME))
            .ok()
            .is_some_and(|contents| is_persona_hook(&contents)),
        Ok(None) => false,
        Err(err) => {
            warn!(%err, "could not locate the hooks directory");
            false
        }
    };

    let corrupt = profiles.corruptions().count();
    if corrupt > 0 {
        warnings.push(format!(
            "{corrupt} profile line{} could not be read",
            if corrupt == 1 { "" } else { "s" }
        ));
    }
    let legacy = profiles.legacy_count();

    let message = match (&resolution, &active) {
        (Some(hit), Some(active)) if active.eq_ignore_ascii_case(&hit.username) => {
            format!("using {active}, as assigned to this directory")
        }
        (Some(hit), Some(active)) => {
            format!("using {active}, but this directory belongs to {}", hit.username)
        }
        (Some(hit), None) => format!("this directory belongs to {}", hit.username),
        (None, Some(active)) => format!("using {active}"),
        (None, None) => "no stored profile is active".to_string(),
    };

    let mut details = json!({
        "cwd": ctx.cwd(),
        "repository": repository,
        "resolution": resolution,
        "active": active,
        "identity": {
            "effective": identity_details(effective.as_ref()),
            "global": identity_details(global.as_ref()),
        },
        "login": { "host": host, "user": login },
        "guard": guard,
        "hook_installed": hook_installed,
        "corrupt": corrupt,
        "legacy": legacy,
        "warnings": warnings,
    });
    if legacy > 0 {
        details["hint"] = json!("run `persona migrate` to rewrite older records");
    }
    Ok(ExecutionOutcome::success(message, details))
}
