use std::path::PathBuf;

use persona_domain::ValidationError;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("profile `{0}` not found")]
    NotFound(String),
    #[error("profile `{0}` already exists")]
    AlreadyExists(String),
    #[error("no directory link for {}", .0.display())]
    LinkNotFound(PathBuf),
    #[error("{} is already linked to `{username}`", .path.display())]
    DuplicateLink { path: PathBuf, username: String },
    #[error(
        "line {line} stores `{username}` in format v{found}, newer than this build understands (v{supported})"
    )]
    NewerFormat {
        username: String,
        line: usize,
        found: u32,
        supported: u32,
    },
    #[error("timed out after {waited_ms} ms waiting for the lock on {}", .path.display())]
    LockTimeout { path: PathBuf, waited_ms: u128 },
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        StoreError::Io {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Stable machine-readable reason used in command details.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "invalid_field",
            StoreError::NotFound(_) => "profile_not_found",
            StoreError::AlreadyExists(_) => "profile_exists",
            StoreError::LinkNotFound(_) => "link_not_found",
            StoreError::DuplicateLink { .. } => "link_exists",
            StoreError::NewerFormat { .. } => "newer_format",
            StoreError::LockTimeout { .. } => "lock_timeout",
            StoreError::Io { .. } => "io_error",
        }
    }

    /// One concrete next step for the user.
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            StoreError::Validation(err) => {
                format!("Fix the {} value and run the command again.", err.field)
            }
            StoreError::NotFound(_) => "Run `persona list` to see stored profiles.".to_string(),
            StoreError::AlreadyExists(username) => {
                format!("Use `persona edit {username}` to change the existing profile.")
            }
            StoreError::LinkNotFound(_) => {
                "Run `persona links` to see which directories are linked.".to_string()
            }
            StoreError::DuplicateLink { .. } => {
                "Pass `--replace` to point the directory at a different profile.".to_string()
            }
            StoreError::NewerFormat { .. } => {
                "Upgrade persona; this build would otherwise downgrade the record.".to_string()
            }
            StoreError::LockTimeout { .. } => {
                "Another persona process is writing; retry, or raise PERSONA_LOCK_TIMEOUT_MS."
                    .to_string()
            }
            StoreError::Io { .. } => {
                "Check permissions and free space in the persona data directory.".to_string()
            }
        }
    }
}
