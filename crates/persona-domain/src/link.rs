//! Directory-to-profile assignments and the legacy basename table they replace.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::format::{join_escaped, split_escaped, DecodeError};
use crate::profile::{validate_username, Field, ValidationError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    #[default]
    Always,
    Ask,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryLink {
    pub path_prefix: PathBuf,
    pub username: String,
    pub mode: LinkMode,
}

impl DirectoryLink {
    /// Builds a link for an already-normalized absolute prefix.
    pub fn new(
        path_prefix: PathBuf,
        username: impl Into<String>,
        mode: LinkMode,
    ) -> Result<Self, ValidationError> {
        let username = username.into();
        validate_username(&username)?;
        validate_prefix(&path_prefix)?;
        Ok(Self {
            path_prefix,
            username,
            mode,
        })
    }

    /// True when `path` is the prefix itself or lives underneath it.
    ///
    /// Matching is per path component, so `/home/alice` does not cover `/home/alice-work`.
    pub fn covers(&self, path: &Path) -> bool {
        path.starts_with(&self.path_prefix)
    }

    pub fn depth(&self) -> usize {
        self.path_prefix.components().count()
    }
}

fn validate_prefix(path: &Path) -> Result<(), ValidationError> {
    if !path.is_absolute() {
        return Err(ValidationError::new(Field::Path, "must be absolute"));
    }
    let Some(text) = path.to_str() else {
        return Err(ValidationError::new(Field::Path, "must be valid UTF-8"));
    };
    if text.chars().any(char::is_control) {
        return Err(ValidationError::new(
            Field::Path,
            "must not contain control characters",
        ));
    }
    Ok(())
}

/// `project_basename=username`, the table directory links superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyProjectAssignment {
    pub basename: String,
    pub username: String,
}

/// Lexically normalizes `path` against `base`: absolute, `.`/`..` folded, no trailing slash.
///
/// Symlinks are not resolved; the prefix stored for a link is the path the user typed.
pub fn normalize_path(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if out.parent().is_some() {
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

pub fn basename(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkDecodeError {
    #[error(transparent)]
    Escape(#[from] DecodeError),
    #[error("link lines have 3 fields, found {0}")]
    FieldCount(usize),
    #[error("unknown auto-switch mode `{0}`")]
    Mode(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("legacy project lines look like `basename=username`")]
    Legacy,
}

pub fn encode_link(link: &DirectoryLink) -> String {
    let path = link.path_prefix.to_string_lossy();
    let mode = link.mode.to_string();
    join_escaped(&[&*path, link.username.as_str(), mode.as_str()])
}

/// Decodes `path|username|mode`. Blank lines and comments yield `None`.
pub fn decode_link(line: &str) -> Result<Option<DirectoryLink>, LinkDecodeError> {
    if is_skippable(line) {
        return Ok(None);
    }
    let fields = split_escaped(line)?;
    if fields.len() != 3 {
        return Err(LinkDecodeError::FieldCount(fields.len()));
    }
    let mode = fields[2]
        .trim()
        .parse::<LinkMode>()
        .map_err(|_| LinkDecodeError::Mode(fields[2].clone()))?;
    let link = DirectoryLink::new(PathBuf::from(&fields[0]), fields[1].clone(), mode)?;
    Ok(Some(link))
}

pub fn decode_legacy_assignment(
    line: &str,
) -> Result<Option<LegacyProjectAssignment>, LinkDecodeError> {
    if is_skippable(line) {
        return Ok(None);
    }
    let (basename, username) = line.split_once('=').ok_or(LinkDecodeError::Legacy)?;
    let basename = basename.trim();
    let username = username.trim();
    if basename.is_empty() || basename.contains('/') {
        return Err(LinkDecodeError::Legacy);
    }
    validate_username(username)?;
    Ok(Some(LegacyProjectAssignment {
        basename: basename.to_string(),
        username: username.to_string(),
    }))
}

fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}
