//! Maps a working directory onto the profile assigned to it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::link::{basename, normalize_path, DirectoryLink, LegacyProjectAssignment, LinkMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Link,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub username: String,
    pub mode: LinkMode,
    pub source: MatchSource,
    /// The link prefix that matched, or the directory whose basename matched a legacy entry.
    pub matched: PathBuf,
}

/// Resolves `cwd` against the link table, then the legacy basename table.
///
/// The deepest link covering `cwd` wins. Legacy assignments only apply when no
/// link does, and always carry [`LinkMode::Always`], matching how they behaved
/// before per-link modes existed.
pub fn resolve(
    cwd: &Path,
    links: &[DirectoryLink],
    legacy: &[LegacyProjectAssignment],
) -> Option<Resolution> {
    let cwd = normalize_path(cwd, Path::new("/"));

    if let Some(link) = links
        .iter()
        .filter(|link| link.covers(&cwd))
        .max_by_key(|link| link.depth())
    {
        return Some(Resolution {
            username: link.username.clone(),
            mode: link.mode,
            source: MatchSource::Link,
            matched: link.path_prefix.clone(),
        });
    }

    let name = basename(&cwd)?;
    legacy
        .iter()
        .find(|entry| entry.basename == name)
        .map(|entry| Resolution {
            username: entry.username.clone(),
            mode: LinkMode::Always,
            source: MatchSource::Legacy,
            matched: cwd.clone(),
        })
}
