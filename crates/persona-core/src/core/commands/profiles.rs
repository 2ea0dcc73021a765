use anyhow::Result;
use persona_domain::Profile;
use serde_json::{json, Value};
use tracing::warn;

use super::{store_error_outcome, NO_SSH_KEY};
use crate::context::CommandContext;
use crate::identity::ssh::expand_home;
use crate::identity::IdentityApplier;
use crate::outcome::ExecutionOutcome;

#[derive(Clone, Debug)]
pub struct ProfileAddRequest {
    pub username: String,
    pub name: String,
    pub email: String,
    pub ssh_key: Option<String>,
    pub host: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileEditRequest {
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// `none` clears the stored key.
    pub ssh_key: Option<String>,
    pub host: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ProfileRemoveRequest {
    pub username: String,
    /// Also remove directory links that point at the profile.
    pub force: bool,
}

fn requested_key(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(NO_SSH_KEY)).then_some(trimmed)
}

fn key_warnings(profile: &Profile) -> Vec<String> {
    profile
        .ssh_key_path
        .as_deref()
        .filter(|path| !expand_home(path).exists())
        .map(|path| format!("SSH key {path} does not exist yet; switching will fail until it does"))
        .into_iter()
        .collect()
}

fn profile_details(profile: &Profile) -> Value {
    json!({
        "username": profile.username,
        "name": profile.display_name,
        "email": profile.email,
        "ssh_key": profile.ssh_key_path,
        "host": profile.host,
        "format": profile.format_version,
    })
}

pub fn profile_add(ctx: &CommandContext, request: &ProfileAddRequest) -> Result<ExecutionOutcome> {
    let mut profile = Profile::new(&request.username, &request.name, &request.email);
    if let Some(key) = request.ssh_key.as_deref().and_then(requested_key) {
        profile = profile.with_ssh_key(key);
    }
    if let Some(host) = &request.host {
        profile = profile.with_host(host.trim());
    }

    let mut store = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    if let Err(err) = store.insert(profile.clone()) {
        return Ok(store_error_outcome(&err));
    }
    Ok(ExecutionOutcome::success(
        format!("added profile {}", profile.username),
        json!({
            "profile": profile_details(&profile),
            "warnings": key_warnings(&profile),
        }),
    ))
}

pub fn profile_edit(ctx: &CommandContext, request: &ProfileEditRequest) -> Result<ExecutionOutcome> {
    if request.name.is_none()
        && request.email.is_none()
        && request.ssh_key.is_none()
        && request.host.is_none()
    {
        return Ok(ExecutionOutcome::user_error(
            "nothing to change",
            json!({
                "reason": "no_changes",
                "hint": "pass at least one of --name, --email, --ssh-key or --host",
            }),
        ));
    }

    let mut store = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let mut profile = match store.get(&request.username) {
        Ok(profile) => profile.clone(),
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let mut changed = Vec::new();
    if let Some(name) = &request.name {
        profile.display_name.clone_from(name);
        changed.push("name");
    }
    if let Some(email) = &request.email {
        profile.email.clone_from(email);
        changed.push("email");
    }
    if let Some(key) = &request.ssh_key {
        profile.ssh_key_path = requested_key(key).map(ToOwned::to_owned);
        changed.push("ssh_key");
    }
    if let Some(host) = &request.host {
        profile.host = host.trim().to_string();
        changed.push("host");
    }

    if let Err(err) = store.put(profile.clone()) {
        return Ok(store_error_outcome(&err));
    }
    let profile = profile.into_current();
    Ok(ExecutionOutcome::success(
        format!("updated profile {}", profile.username),
        json!({
            "profile": profile_details(&profile),
            "changed": changed,
            "warnings": key_warnings(&profile),
        }),
    ))
}

pub fn profile_remove(
    ctx: &CommandContext,
    request: &ProfileRemoveRequest,
) -> Result<ExecutionOutcome> {
    let mut profiles = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let mut links = match ctx.link_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let linked: Vec<_> = links
        .links()
        .into_iter()
        .filter(|link| link.username == request.username)
        .map(|link| link.path_prefix)
        .collect();
    if !linked.is_empty() && !request.force {
        return Ok(ExecutionOutcome::user_error(
            format!(
                "profile {} is still linked to {} director{}",
                request.username,
                linked.len(),
                if linked.len() == 1 { "y" } else { "ies" }
            ),
            json!({
                "reason": "profile_linked",
                "links": linked,
                "hint": "unlink those directories first, or pass --force to remove the links too",
            }),
        ));
    }

    let removed = match profiles.remove(&request.username) {
        Ok(profile) => profile,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let unlinked = if linked.is_empty() {
        Vec::new()
    } else {
        match links.unlink_profile(&request.username) {
            Ok(paths) => paths,
            Err(err) => return Ok(store_error_outcome(&err)),
        }
    };
    Ok(ExecutionOutcome::success(
        format!("removed profile {}", removed.username),
        json!({
            "profile": profile_details(&removed),
            "unlinked": unlinked,
        }),
    ))
}

pub fn profile_list(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let store = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let mut warnings = Vec::new();
    let identity = match IdentityApplier::new(ctx.git()).current(ctx.cwd(), None) {
        Ok(identity) => Some(identity),
        Err(err) => {
            warn!(%err, "could not read the active git identity");
            warnings.push(format!("could not read the active git identity: {err}"));
            None
        }
    };

    let profiles: Vec<Value> = store
        .list()
        .map(|profile| {
            let mut details = profile_details(profile);
            details["active"] = json!(identity
                .as_ref()
                .is_some_and(|identity| identity.matches(profile)));
            details
        })
        .collect();
    let corrupt: Vec<_> = store.corruptions().cloned().collect();
    for line in &corrupt {
        warnings.push(format!("line {} skipped: {}", line.line, line.reason));
    }
    let legacy = store.legacy_count();

    let mut details = json!({
        "profiles": profiles,
        "corrupt": corrupt,
        "legacy": legacy,
        "warnings": warnings,
    });
    if profiles.is_empty() {
        details["hint"] = json!("add one with `persona add <username> --name <name> --email <email>`");
        return Ok(ExecutionOutcome::success("no profiles stored", details));
    }
    if legacy > 0 {
        details["hint"] = json!("run `persona migrate` to rewrite older records");
    }
    Ok(ExecutionOutcome::success(
        format!(
            "{} profile{}",
            profiles.len(),
            if profiles.len() == 1 { "" } else { "s" }
        ),
        details,
    ))
}
