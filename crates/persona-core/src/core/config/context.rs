use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{Config, GlobalOptions};
#[cfg(test)]
use crate::config::EnvSnapshot;
use crate::effects::{self, Effects, SharedEffects};
use crate::store::{LinkStore, ProfileStore, StoreError};
use crate::CommandGroup;

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

/// Everything a command handler may consult, captured once per invocation.
pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
    cwd: PathBuf,
    logins: RefCell<HashMap<String, Option<String>>>,
    effects: SharedEffects,
}

impl<'a> CommandContext<'a> {
    /// Creates a command context for the process working directory.
    ///
    /// `config` is the one built from this invocation's environment; the
    /// context never reads the environment a second time.
    ///
    /// # Errors
    /// Returns an error if the working directory cannot be determined.
    pub fn new(global: &'a GlobalOptions, effects: SharedEffects, config: Config) -> Result<Self> {
        let cwd = std::env::current_dir().context("unable to read the working directory")?;
        Ok(Self::with_config(global, effects, config, cwd))
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        global: &'a GlobalOptions,
        effects: SharedEffects,
        env: &EnvSnapshot,
        cwd: PathBuf,
    ) -> Result<Self> {
        Ok(Self::with_config(global, effects, Config::from_snapshot(env)?, cwd))
    }

    fn with_config(
        global: &'a GlobalOptions,
        effects: SharedEffects,
        config: Config,
        cwd: PathBuf,
    ) -> Self {
        Self {
            global,
            config,
            cwd,
            logins: RefCell::new(HashMap::new()),
            effects,
        }
    }

    pub fn effects(&self) -> &dyn Effects {
        self.effects.as_ref()
    }

    pub fn git(&self) -> &dyn effects::GitClient {
        self.effects.git()
    }

    pub fn ssh(&self) -> &dyn effects::SshProbe {
        self.effects.ssh()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Authenticated login for `host`, asking the GitHub CLI at most once per invocation.
    ///
    /// # Errors
    /// Returns an error when the probe itself cannot run.
    pub fn current_login(&self, host: &str) -> Result<Option<String>> {
        if let Some(cached) = self.logins.borrow().get(host) {
            return Ok(cached.clone());
        }
        let login = self.effects.auth().current_login(host)?;
        self.logins
            .borrow_mut()
            .insert(host.to_string(), login.clone());
        Ok(login)
    }

    pub(crate) fn profile_store(&self) -> Result<ProfileStore, StoreError> {
        ProfileStore::open(self.config.paths(), self.config.lock_timeout())
    }

    pub(crate) fn link_store(&self) -> Result<LinkStore, StoreError> {
        LinkStore::open(self.config.paths(), self.config.lock_timeout())
    }
}
