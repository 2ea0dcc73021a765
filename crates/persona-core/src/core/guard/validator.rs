use anyhow::Result;
use persona_domain::Resolution;
use serde::Serialize;
use strum::Display;
use tracing::{debug, warn};

use crate::config::GUARD_SKIP_ENV;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum GuardState {
    NoAssignment,
    Matched,
    Mismatched,
    Unauthenticated,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardReport {
    pub allow: bool,
    /// `None` when the bypass skipped evaluation.
    pub state: Option<GuardState>,
    pub message: String,
    pub assigned: Option<String>,
    pub current: Option<String>,
    pub bypassed: bool,
}

impl GuardReport {
    /// The report for a run skipped by the bypass toggle.
    #[must_use]
    pub fn bypassed(assigned: Option<String>) -> Self {
        Self {
            allow: true,
            state: None,
            message: format!("guard bypassed by {GUARD_SKIP_ENV}"),
            assigned,
            current: None,
            bypassed: true,
        }
    }
}

/// Decides whether a commit may proceed in the directory a resolution came from.
pub struct GuardValidator {
    bypass: bool,
}

impl GuardValidator {
    #[must_use]
    pub fn new(bypass: bool) -> Self {
        Self { bypass }
    }

    /// `login` is only consulted when a profile is assigned.
    pub fn check(
        &self,
        resolution: Option<&Resolution>,
        host: &str,
        login: impl FnOnce(&str) -> Result<Option<String>>,
    ) -> GuardReport {
        if self.bypass {
            debug!("guard bypassed");
            return GuardReport::bypassed(resolution.map(|r| r.username.clone()));
        }

        let Some(resolution) = resolution else {
            return GuardReport {
                allow: true,
                state: Some(GuardState::NoAssignment),
                message: "no profile is assigned to this directory".to_string(),
                assigned: None,
                current: None,
                bypassed: false,
            };
        };
        let assigned = resolution.username.clone();

        let current = match login(host) {
            Ok(current) => current,
            Err(err) => {
                warn!(%host, %err, "could not ask the GitHub CLI for the current login");
                None
            }
        };

        let (allow, state, message) = match &current {
            None => (
                true,
                GuardState::Unauthenticated,
                format!("not logged in to {host}; cannot confirm `{assigned}` is committing"),
            ),
            Some(login) if login.eq_ignore_ascii_case(&assigned) => (
                true,
                GuardState::Matched,
                format!("logged in as `{login}` as expected"),
            ),
            Some(login) => (
                false,
                GuardState::Mismatched,
                format!(
                    "this directory belongs to `{assigned}` but {host} is logged in as `{login}`"
                ),
            ),
        };
        debug!(%state, allow, "guard evaluated");
        GuardReport {
            allow,
            state: Some(state),
            message,
            assigned: Some(assigned),
            current,
            bypassed: false,
        }
    }
}
