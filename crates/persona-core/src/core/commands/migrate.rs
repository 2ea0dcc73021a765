use anyhow::Result;
use persona_domain::MatchSource;
use serde_json::json;
use tracing::info;

use super::store_error_outcome;
use crate::context::CommandContext;
use crate::outcome::ExecutionOutcome;

#[derive(Clone, Debug, Default)]
pub struct MigrateRequest {
    /// Delete undecodable lines instead of carrying them over.
    pub drop_corrupt: bool,
    /// Turn the legacy assignment for the working directory's basename into a link.
    pub adopt_project: bool,
    pub dry_run: bool,
}

pub fn migrate(ctx: &CommandContext, request: &MigrateRequest) -> Result<ExecutionOutcome> {
    let mut profiles = match ctx.profile_store() {
        Ok(store) => store,
        Err(err) => return Ok(store_error_outcome(&err)),
    };
    let report = match profiles.migrate_all(request.drop_corrupt, request.dry_run) {
        Ok(report) => report,
        Err(err) => return Ok(store_error_outcome(&err)),
    };

    let mut adopted = None;
    if request.adopt_project {
        let mut links = match ctx.link_store() {
            Ok(store) => store,
            Err(err) => return Ok(store_error_outcome(&err)),
        };
        if request.dry_run {
            adopted = links
                .resolve(ctx.cwd())
                .filter(|hit| hit.source == MatchSource::Legacy)
                .map(|hit| json!({ "path_prefix": ctx.cwd(), "username": hit.username }));
        } else {
            match links.adopt_legacy(ctx.cwd()) {
                Ok(link) => adopted = link.map(|link| json!(link)),
                Err(err) => return Ok(store_error_outcome(&err)),
            }
        }
    }

    let count = report.migrated.len();
    info!(migrated = count, dry_run = request.dry_run, "migration finished");
    let verb = if request.dry_run { "would migrate" } else { "migrated" };
    let mut message = format!(
        "{verb} {count} profile record{}",
        if count == 1 { "" } else { "s" }
    );
    if adopted.is_some() {
        message.push_str(if request.dry_run {
            " and would adopt this project"
        } else {
            " and adopted this project"
        });
    }
    let mut details = json!({
        "report": report,
        "adopted": adopted,
    });
    if !report.kept_corrupt.is_empty() && !request.drop_corrupt {
        details["hint"] = json!("pass --drop-corrupt to delete lines that cannot be read");
    }
    Ok(ExecutionOutcome::success(message, details))
}
