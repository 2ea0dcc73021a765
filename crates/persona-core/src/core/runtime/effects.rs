use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::config::{EnvSnapshot, ToolOverrides};
use crate::process::{run_command, RunOutput};

/// Which git configuration file a read or write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    Local,
    Global,
}

impl ConfigScope {
    fn flag(self) -> &'static str {
        match self {
            ConfigScope::Local => "--local",
            ConfigScope::Global => "--global",
        }
    }
}

pub trait GitClient: Send + Sync {
    /// Top-level directory of the repository containing `cwd`, if any.
    fn repository_root(&self, cwd: &Path) -> Result<Option<PathBuf>>;
    /// Directory git runs hooks from, honoring `core.hooksPath`.
    fn hooks_dir(&self, cwd: &Path) -> Result<Option<PathBuf>>;
    /// Reads `key` from `scope`, or the effective value when `scope` is `None`.
    fn config_get(&self, cwd: &Path, scope: Option<ConfigScope>, key: &str)
        -> Result<Option<String>>;
    fn config_set(&self, cwd: &Path, scope: ConfigScope, key: &str, value: &str) -> Result<()>;
    /// Removes `key` from `scope`; an absent key is not an error.
    fn config_unset(&self, cwd: &Path, scope: ConfigScope, key: &str) -> Result<()>;
}

/// "Which account is the GitHub CLI logged in as", and nothing more.
pub trait AuthProbe: Send + Sync {
    fn current_login(&self, host: &str) -> Result<Option<String>>;
}

pub trait SshProbe: Send + Sync {
    fn authenticate(&self, key: &Path, host: &str, timeout: Duration) -> Result<RunOutput>;
}

pub trait Effects: Send + Sync {
    fn git(&self) -> &dyn GitClient;
    fn auth(&self) -> &dyn AuthProbe;
    fn ssh(&self) -> &dyn SshProbe;
}

pub type SharedEffects = Arc<dyn Effects>;

pub struct SystemEffects {
    git: Arc<SystemGit>,
    auth: Arc<GhAuthProbe>,
    ssh: Arc<SystemSsh>,
}

impl SystemEffects {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tools(&ToolOverrides::from_snapshot(&EnvSnapshot::capture()))
    }

    #[must_use]
    pub fn with_tools(tools: &ToolOverrides) -> Self {
        Self {
            git: Arc::new(SystemGit {
                program: Tool::new("git", tools.git.clone()),
            }),
            auth: Arc::new(GhAuthProbe {
                program: Tool::new("gh", tools.gh.clone()),
            }),
            ssh: Arc::new(SystemSsh {
                program: Tool::new("ssh", tools.ssh.clone()),
            }),
        }
    }
}

impl Default for SystemEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl Effects for SystemEffects {
    fn git(&self) -> &dyn GitClient {
        self.git.as_ref()
    }

    fn auth(&self) -> &dyn AuthProbe {
        self.auth.as_ref()
    }

    fn ssh(&self) -> &dyn SshProbe {
        self.ssh.as_ref()
    }
}

#[derive(Debug, Clone)]
struct Tool {
    name: &'static str,
    requested: Option<String>,
}

impl Tool {
    fn new(name: &'static str, requested: Option<String>) -> Self {
        Self { name, requested }
    }

    fn locate(&self) -> Result<PathBuf> {
        let wanted = self.requested.as_deref().unwrap_or(self.name);
        which::which(wanted).with_context(|| match &self.requested {
            Some(path) => format!("{} override `{path}` is not an executable", self.name),
            None => format!("`{}` was not found on PATH", self.name),
        })
    }

    fn run(&self, args: &[&str], cwd: &Path) -> Result<RunOutput> {
        let program = self.locate()?;
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        run_command(&program, &args, &[], cwd)
    }
}

struct SystemGit {
    program: Tool,
}

impl SystemGit {
    fn rev_parse(&self, cwd: &Path, args: &[&str]) -> Result<Option<String>> {
        let mut full = vec!["rev-parse"];
        full.extend_from_slice(args);
        let output = self.program.run(&full, cwd)?;
        if !output.success() {
            debug!(cwd = %cwd.display(), stderr = output.stderr.trim(), "git rev-parse failed");
            return Ok(None);
        }
        let line = output.stdout.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}

impl GitClient for SystemGit {
    fn repository_root(&self, cwd: &Path) -> Result<Option<PathBuf>> {
        Ok(self.rev_parse(cwd, &["--show-toplevel"])?.map(PathBuf::from))
    }

    fn hooks_dir(&self, cwd: &Path) -> Result<Option<PathBuf>> {
        Ok(self
            .rev_parse(cwd, &["--git-path", "hooks"])?
            .map(|path| cwd.join(path)))
    }

    fn config_get(
        &self,
        cwd: &Path,
        scope: Option<ConfigScope>,
        key: &str,
    ) -> Result<Option<String>> {
        let mut args = vec!["config"];
        if let Some(scope) = scope {
            args.push(scope.flag());
        }
        args.extend(["--get", key]);
        let output = self.program.run(&args, cwd)?;
        match output.code {
            0 => Ok(Some(output.stdout.trim_end_matches(['\n', '\r']).to_string())),
            1 => Ok(None),
            code => bail!(
                "git config --get {key} exited with {code}: {}",
                output.stderr.trim()
            ),
        }
    }

    fn config_set(&self, cwd: &Path, scope: ConfigScope, key: &str, value: &str) -> Result<()> {
        let output = self.program.run(&["config", scope.flag(), key, value], cwd)?;
        if !output.success() {
            bail!("git config {} {key} failed: {}", scope.flag(), output.stderr.trim());
        }
        Ok(())
    }

    fn config_unset(&self, cwd: &Path, scope: ConfigScope, key: &str) -> Result<()> {
        let output = self
            .program
            .run(&["config", scope.flag(), "--unset-all", key], cwd)?;
        // git exits 5 when there is nothing to unset
        match output.code {
            0 | 5 => Ok(()),
            _ => bail!(
                "git config {} --unset-all {key} failed: {}",
                scope.flag(),
                output.stderr.trim()
            ),
        }
    }
}

struct GhAuthProbe {
    program: Tool,
}

impl AuthProbe for GhAuthProbe {
    fn current_login(&self, host: &str) -> Result<Option<String>> {
        let cwd = std::env::temp_dir();
        let output = self
            .program
            .run(&["auth", "status", "--active", "--hostname", host], &cwd)?;
        if !output.success() {
            debug!(%host, stderr = output.stderr.trim(), "gh reports no authenticated user");
            return Ok(None);
        }
        // older gh releases print the status report on stderr
        Ok(parse_auth_status(&output.stdout, host).or_else(|| parse_auth_status(&output.stderr, host)))
    }
}

/// Reads the login from `gh auth status` output.
///
/// Accepts both `Logged in to <host> account <login>` and the older
/// `Logged in to <host> as <login>` wording.
fn parse_auth_status(report: &str, host: &str) -> Option<String> {
    report.lines().find_map(|line| {
        let rest = line.split_once("Logged in to ")?.1;
        let rest = rest.strip_prefix(host)?.trim_start();
        let rest = rest
            .strip_prefix("account ")
            .or_else(|| rest.strip_prefix("as "))?;
        let login = rest
            .split(|c: char| c.is_whitespace() || c == ',')
            .next()
            .filter(|login| !login.is_empty())?;
        Some(login.to_string())
    })
}

struct SystemSsh {
    program: Tool,
}

impl SshProbe for SystemSsh {
    fn authenticate(&self, key: &Path, host: &str, timeout: Duration) -> Result<RunOutput> {
        let connect_timeout = format!("ConnectTimeout={}", timeout.as_secs().max(1));
        let key = key.to_string_lossy();
        let target = format!("git@{host}");
        let cwd = std::env::temp_dir();
        self.program.run(
            &[
                "-T",
                "-o",
                "BatchMode=yes",
                "-o",
                connect_timeout.as_str(),
                "-o",
                "IdentitiesOnly=yes",
                "-i",
                &*key,
                target.as_str(),
            ],
            &cwd,
        )
    }
}
