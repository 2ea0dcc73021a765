use std::path::{Path, PathBuf};

use anyhow::Result;
use persona_domain::Profile;
use serde::Serialize;
use tracing::{debug, info};

use super::ssh::{check_key, expand_home, ssh_command_for};
use super::ApplyError;
use crate::effects::{ConfigScope, GitClient};

pub const KEY_NAME: &str = "user.name";
pub const KEY_EMAIL: &str = "user.email";
pub const KEY_SSH: &str = "core.sshCommand";

const UNSET: &str = "<unset>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigChange {
    pub key: &'static str,
    pub from: Option<String>,
    /// `None` means the key was unset.
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub scope: ConfigScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<PathBuf>,
    pub changes: Vec<ConfigChange>,
    /// Keys applied globally that the current repository overrides locally.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shadowed: Vec<&'static str>,
}

impl ApplyReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// The identity git would use, as read back from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
    pub ssh_command: Option<String>,
}

impl GitIdentity {
    /// True when name and email both equal the profile's.
    #[must_use]
    pub fn matches(&self, profile: &Profile) -> bool {
        self.name.as_deref() == Some(profile.display_name.as_str())
            && self.email.as_deref() == Some(profile.email.as_str())
    }
}

pub struct IdentityApplier<'a> {
    git: &'a dyn GitClient,
}

impl<'a> IdentityApplier<'a> {
    pub fn new(git: &'a dyn GitClient) -> Self {
        Self { git }
    }

    /// Writes the profile's identity at `scope`, touching only keys that differ.
    pub fn apply(
        &self,
        profile: &Profile,
        scope: ConfigScope,
        cwd: &Path,
    ) -> Result<ApplyReport, ApplyError> {
        let repository = match scope {
            ConfigScope::Local => Some(
                self.git
                    .repository_root(cwd)?
                    .ok_or_else(|| ApplyError::NotARepository(cwd.to_path_buf()))?,
            ),
            ConfigScope::Global => None,
        };
        let workdir = repository.as_deref().unwrap_or(cwd);

        // Validate everything before the first write so a bad key leaves config untouched.
        let ssh_command = match profile.ssh_key_path.as_deref() {
            Some(path) => {
                let key = expand_home(path);
                check_key(&key)?;
                Some(ssh_command_for(&key))
            }
            None => None,
        };
        let desired = [
            (KEY_NAME, Some(profile.display_name.clone())),
            (KEY_EMAIL, Some(profile.email.clone())),
            (KEY_SSH, ssh_command),
        ];

        let mut changes = Vec::new();
        for (key, want) in &desired {
            let have = self.git.config_get(workdir, Some(scope), key)?;
            if have == *want {
                continue;
            }
            match want {
                Some(value) => self.git.config_set(workdir, scope, key, value)?,
                None => self.git.config_unset(workdir, scope, key)?,
            }
            debug!(%key, %scope, "updated git config");
            changes.push(ConfigChange {
                key: *key,
                from: have,
                to: want.clone(),
            });
        }

        self.verify(workdir, scope, &desired)?;

        let shadowed = match scope {
            ConfigScope::Global => self.shadowed(cwd, &desired)?,
            ConfigScope::Local => Vec::new(),
        };

        info!(
            username = %profile.username,
            %scope,
            changed = changes.len(),
            "applied identity"
        );
        Ok(ApplyReport {
            scope,
            repository,
            changes,
            shadowed,
        })
    }

    fn verify(
        &self,
        workdir: &Path,
        scope: ConfigScope,
        desired: &[(&'static str, Option<String>)],
    ) -> Result<(), ApplyError> {
        for (key, want) in desired {
            // Set keys must win in effect; unset keys only need to be gone from this scope.
            let read_scope = match (want, scope) {
                (Some(_), ConfigScope::Local) => None,
                _ => Some(scope),
            };
            let found = self.git.config_get(workdir, read_scope, key)?;
            if found != *want {
                return Err(ApplyError::NotApplied {
                    key: *key,
                    expected: want.clone().unwrap_or_else(|| UNSET.to_string()),
                    found: found.unwrap_or_else(|| UNSET.to_string()),
                });
            }
        }
        Ok(())
    }

    fn shadowed(
        &self,
        cwd: &Path,
        desired: &[(&'static str, Option<String>)],
    ) -> Result<Vec<&'static str>> {
        let mut shadowed = Vec::new();
        for (key, want) in desired {
            if want.is_some() && self.git.config_get(cwd, None, key)? != *want {
                shadowed.push(*key);
            }
        }
        Ok(shadowed)
    }

    /// True when `scope` already holds exactly the values [`apply`](Self::apply) would write.
    pub fn is_applied(&self, profile: &Profile, scope: ConfigScope, cwd: &Path) -> Result<bool> {
        let current = self.current(cwd, Some(scope))?;
        let ssh_command = profile
            .ssh_key_path
            .as_deref()
            .map(|path| ssh_command_for(&expand_home(path)));
        Ok(current.matches(profile) && current.ssh_command == ssh_command)
    }

    /// Reads the identity at `scope`, or the effective one when `scope` is `None`.
    pub fn current(&self, cwd: &Path, scope: Option<ConfigScope>) -> Result<GitIdentity> {
        Ok(GitIdentity {
            name: self.git.config_get(cwd, scope, KEY_NAME)?,
            email: self.git.config_get(cwd, scope, KEY_EMAIL)?,
            ssh_command: self.git.config_get(cwd, scope, KEY_SSH)?,
        })
    }
}
