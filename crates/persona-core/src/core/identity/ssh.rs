use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use persona_domain::Profile;
use serde::Serialize;
use tracing::debug;

use super::ApplyError;
use crate::effects::SshProbe;

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (rest, dirs_next::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// `core.sshCommand` value pinning git to a single key.
pub fn ssh_command_for(key: &Path) -> String {
    let quoted = key.to_string_lossy().replace('\'', r"'\''");
    format!("ssh -i '{quoted}' -o IdentitiesOnly=yes")
}

/// Recovers the key path from a `core.sshCommand` value, if it names one with `-i`.
pub fn key_from_ssh_command(command: &str) -> Option<String> {
    let (_, rest) = command.split_once("-i ")?;
    let rest = rest.trim_start();
    if let Some(quoted) = rest.strip_prefix('\'') {
        let mut key = String::new();
        let mut remaining = quoted;
        loop {
            let end = remaining.find('\'')?;
            key.push_str(&remaining[..end]);
            remaining = &remaining[end + 1..];
            match remaining.strip_prefix(r"\''") {
                Some(after) => {
                    key.push('\'');
                    remaining = after;
                }
                None => return Some(key),
            }
        }
    }
    if let Some(quoted) = rest.strip_prefix('"') {
        return quoted.split_once('"').map(|(key, _)| key.to_string());
    }
    rest.split_whitespace().next().map(ToOwned::to_owned)
}

/// Refuses keys that are missing or readable by group/other.
pub(crate) fn check_key(path: &Path) -> Result<(), ApplyError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ApplyError::SshKeyMissing {
                path: path.to_path_buf(),
            })
        }
        Err(err) => {
            return Err(ApplyError::Tool(
                anyhow!(err).context(format!("failed to inspect {}", path.display())),
            ))
        }
    };
    if !metadata.is_file() {
        return Err(ApplyError::SshKeyMissing {
            path: path.to_path_buf(),
        });
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            return Err(ApplyError::SshKeyPermissions {
                path: path.to_path_buf(),
                mode,
            });
        }
    }
    Ok(())
}

/// Extracts the account name from a forge's SSH greeting.
pub fn parse_greeting(transcript: &str) -> Option<String> {
    transcript.lines().find_map(|line| {
        let line = line.trim();
        let rest = line
            .strip_prefix("Hi ")
            .or_else(|| line.strip_prefix("Welcome to GitLab, @"))?;
        let (login, _) = rest.split_once('!')?;
        let login = login.trim();
        (!login.is_empty() && !login.contains(char::is_whitespace)).then(|| login.to_string())
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SshTestReport {
    pub username: String,
    pub host: String,
    pub key: PathBuf,
    pub login: Option<String>,
    pub matches: bool,
    pub exit_code: i32,
}

/// Authenticates once against `git@<host>` with the profile's key.
pub fn probe(
    ssh: &dyn SshProbe,
    profile: &Profile,
    timeout: Duration,
) -> Result<SshTestReport, ApplyError> {
    let key = profile
        .ssh_key_path
        .as_deref()
        .map(expand_home)
        .ok_or_else(|| ApplyError::NoSshKey(profile.username.clone()))?;
    check_key(&key)?;
    let output = ssh.authenticate(&key, &profile.host, timeout)?;
    debug!(code = output.code, stderr = output.stderr.trim(), "ssh probe finished");
    let login = parse_greeting(&output.stderr).or_else(|| parse_greeting(&output.stdout));
    let matches = login
        .as_deref()
        .is_some_and(|login| login.eq_ignore_ascii_case(&profile.username));
    Ok(SshTestReport {
        username: profile.username.clone(),
        host: profile.host.clone(),
        key,
        login,
        matches,
        exit_code: output.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_command_quotes_the_key() {
        assert_eq!(
            ssh_command_for(Path::new("/home/a/.ssh/id_work")),
            "ssh -i '/home/a/.ssh/id_work' -o IdentitiesOnly=yes"
        );
        let odd = ssh_command_for(Path::new("/keys/it's mine"));
        assert_eq!(odd, r"ssh -i '/keys/it'\''s mine' -o IdentitiesOnly=yes");
        assert_eq!(key_from_ssh_command(&odd).as_deref(), Some("/keys/it's mine"));
    }

    #[test]
    fn key_is_recovered_from_common_spellings() {
        assert_eq!(
            key_from_ssh_command("ssh -i ~/.ssh/id_rsa -F /dev/null").as_deref(),
            Some("~/.ssh/id_rsa")
        );
        assert_eq!(
            key_from_ssh_command("ssh -i \"/k/a b\"").as_deref(),
            Some("/k/a b")
        );
        assert_eq!(key_from_ssh_command("ssh -o BatchMode=yes"), None);
    }

    #[test]
    fn greetings_from_common_forges() {
        assert_eq!(
            parse_greeting(
                "Hi alice-w! You've successfully authenticated, but GitHub does not provide shell access."
            )
            .as_deref(),
            Some("alice-w")
        );
        assert_eq!(
            parse_greeting("Welcome to GitLab, @bob!").as_deref(),
            Some("bob")
        );
        assert_eq!(parse_greeting("Permission denied (publickey)."), None);
    }

    #[test]
    fn home_expansion_only_touches_a_leading_tilde() {
        assert_eq!(expand_home("/abs/key"), PathBuf::from("/abs/key"));
        assert_eq!(expand_home("rel/~/key"), PathBuf::from("rel/~/key"));
        if let Some(home) = dirs_next::home_dir() {
            assert_eq!(expand_home("~/.ssh/id"), home.join(".ssh/id"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn loose_key_permissions_are_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let key = dir.path().join("id_test");
        std::fs::write(&key, "not really a key").expect("write");
        std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o644)).expect("chmod");
        assert!(matches!(
            check_key(&key),
            Err(ApplyError::SshKeyPermissions { mode: 0o644, .. })
        ));
        std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o600)).expect("chmod");
        assert!(check_key(&key).is_ok());
        assert!(matches!(
            check_key(&dir.path().join("missing")),
            Err(ApplyError::SshKeyMissing { .. })
        ));
    }
}
