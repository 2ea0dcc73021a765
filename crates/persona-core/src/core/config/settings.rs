use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::StorePaths;

pub(crate) const HOME_ENV: &str = "PERSONA_HOME";
pub(crate) const GUARD_SKIP_ENV: &str = "PERSONA_GUARD_SKIP";
pub(crate) const LOCK_TIMEOUT_ENV: &str = "PERSONA_LOCK_TIMEOUT_MS";
pub(crate) const SSH_TIMEOUT_ENV: &str = "PERSONA_SSH_TIMEOUT";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 3000;
const DEFAULT_SSH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Treats any value other than an explicit "off" spelling as enabled.
    pub(crate) fn flag_is_enabled(&self, key: &str) -> bool {
        self.var(key).is_some_and(is_truthy)
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

pub(crate) fn is_truthy(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    !matches!(lowered.as_str(), "0" | "false" | "no" | "off" | "")
}

/// Per-tool program overrides; unset entries fall back to a `PATH` lookup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolOverrides {
    pub git: Option<String>,
    pub gh: Option<String>,
    pub ssh: Option<String>,
}

impl ToolOverrides {
    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let pick = |key: &str| {
            snapshot
                .var(key)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
        };
        Self {
            git: pick("PERSONA_GIT"),
            gh: pick("PERSONA_GH"),
            ssh: pick("PERSONA_SSH"),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub(crate) paths: StorePaths,
    pub(crate) lock_timeout: Duration,
    pub(crate) ssh_timeout: Duration,
    pub(crate) guard_bypass: bool,
    pub(crate) tools: ToolOverrides,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if no data directory can be determined or it is not absolute.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let root = match snapshot.var(HOME_ENV).filter(|value| !value.trim().is_empty()) {
            Some(value) => PathBuf::from(value),
            None => dirs_next::config_dir()
                .map(|dir| dir.join("persona"))
                .ok_or_else(|| {
                    anyhow!("unable to determine a config directory; set {HOME_ENV}")
                })?,
        };
        if !root.is_absolute() {
            bail!("{HOME_ENV} must be an absolute path, got `{}`", root.display());
        }
        Ok(Self {
            paths: StorePaths::new(root),
            lock_timeout: Duration::from_millis(parse_number(
                snapshot,
                LOCK_TIMEOUT_ENV,
                DEFAULT_LOCK_TIMEOUT_MS,
            )),
            ssh_timeout: Duration::from_secs(
                parse_number(snapshot, SSH_TIMEOUT_ENV, DEFAULT_SSH_TIMEOUT_SECS).max(1),
            ),
            guard_bypass: snapshot.flag_is_enabled(GUARD_SKIP_ENV),
            tools: ToolOverrides::from_snapshot(snapshot),
        })
    }

    #[must_use]
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    #[must_use]
    pub fn ssh_timeout(&self) -> Duration {
        self.ssh_timeout
    }

    #[must_use]
    pub fn guard_bypass(&self) -> bool {
        self.guard_bypass
    }

    #[must_use]
    pub fn tools(&self) -> &ToolOverrides {
        &self.tools
    }
}

fn parse_number(snapshot: &EnvSnapshot, key: &str, default: u64) -> u64 {
    match snapshot.var(key) {
        None => default,
        Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!(%key, value = raw, default, "ignoring non-numeric setting");
            default
        }),
    }
}
