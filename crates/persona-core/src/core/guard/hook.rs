use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::config::GUARD_SKIP_ENV;

pub const HOOK_MARKER: &str = "# managed by persona: guard hook";
pub const HOOK_NAME: &str = "pre-commit";
const BACKUP_NAME: &str = "pre-commit.persona-backup";

#[derive(thiserror::Error, Debug)]
pub enum HookError {
    #[error("{} already exists and was not written by persona", .0.display())]
    Foreign(PathBuf),
    #[error("a previous backup already exists at {}", .0.display())]
    BackupExists(PathBuf),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl HookError {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            HookError::Foreign(_) => "foreign_hook",
            HookError::BackupExists(_) => "backup_exists",
            HookError::Io(_) => "io_error",
        }
    }

    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            HookError::Foreign(_) => {
                "Pass `--force` to move the existing hook aside and install persona's.".to_string()
            }
            HookError::BackupExists(path) => {
                format!("Restore or delete {} first.", path.display())
            }
            HookError::Io(_) => "Check permissions on the repository's hooks directory.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallAction {
    Installed,
    Updated,
    Unchanged,
    /// Installed after moving a foreign hook to the backup path.
    Replaced,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookInstall {
    pub action: InstallAction,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookRemoval {
    pub removed: bool,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored: Option<PathBuf>,
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// POSIX shell pre-commit hook that defers to `<program> guard check`.
pub fn hook_script(program: &Path) -> String {
    let program = shell_quote(&program.to_string_lossy());
    format!(
        "#!/bin/sh\n\
         {HOOK_MARKER}\n\
         case \"${{{GUARD_SKIP_ENV}:-}}\" in\n\
         \x20 \"\"|0|[Ff][Aa][Ll][Ss][Ee]|[Nn][Oo]|[Oo][Ff][Ff]) ;;\n\
         \x20 *) exit 0 ;;\n\
         esac\n\
         exec {program} guard check\n"
    )
}

pub fn is_persona_hook(contents: &str) -> bool {
    contents.lines().take(3).any(|line| line.trim() == HOOK_MARKER)
}

fn read_hook(path: &Path) -> Result<Option<String>, HookError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(HookError::Io(
            anyhow::Error::new(err).context(format!("failed to read {}", path.display())),
        )),
    }
}

pub fn install(hooks_dir: &Path, program: &Path, force: bool) -> Result<HookInstall, HookError> {
    let path = hooks_dir.join(HOOK_NAME);
    let script = hook_script(program);
    let mut backup = None;
    let action = match read_hook(&path)? {
        None => InstallAction::Installed,
        Some(existing) if existing == script => InstallAction::Unchanged,
        Some(existing) if is_persona_hook(&existing) => InstallAction::Updated,
        Some(_) if !force => return Err(HookError::Foreign(path)),
        Some(_) => {
            let target = hooks_dir.join(BACKUP_NAME);
            if target.exists() {
                return Err(HookError::BackupExists(target));
            }
            fs::rename(&path, &target).with_context(|| {
                format!("failed to move {} to {}", path.display(), target.display())
            })?;
            backup = Some(target);
            InstallAction::Replaced
        }
    };
    if action != InstallAction::Unchanged {
        fs::create_dir_all(hooks_dir)
            .with_context(|| format!("failed to create {}", hooks_dir.display()))?;
        fs::write(&path, &script).with_context(|| format!("failed to write {}", path.display()))?;
        make_executable(&path)?;
        info!(path = %path.display(), ?action, "installed guard hook");
    }
    Ok(HookInstall {
        action,
        path,
        backup,
    })
}

pub fn uninstall(hooks_dir: &Path) -> Result<HookRemoval, HookError> {
    let path = hooks_dir.join(HOOK_NAME);
    match read_hook(&path)? {
        None => {
            return Ok(HookRemoval {
                removed: false,
                path,
                restored: None,
            })
        }
        Some(existing) if !is_persona_hook(&existing) => return Err(HookError::Foreign(path)),
        Some(_) => {}
    }
    fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
    let backup = hooks_dir.join(BACKUP_NAME);
    let restored = if backup.exists() {
        fs::rename(&backup, &path).with_context(|| {
            format!("failed to restore {} from {}", path.display(), backup.display())
        })?;
        Some(backup)
    } else {
        None
    };
    info!(path = %path.display(), restored = restored.is_some(), "removed guard hook");
    Ok(HookRemoval {
        removed: true,
        path,
        restored,
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), HookError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to mark {} executable", path.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), HookError> {
    Ok(())
}
