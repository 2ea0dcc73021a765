use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use persona_domain::{
    basename, decode_legacy_assignment, decode_link, encode_link, resolve, DirectoryLink,
    LegacyProjectAssignment, LinkMode, Resolution,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{acquire_lock, read_file, render_lines, write_file, StoreError, StorePaths};

#[derive(Debug, Clone)]
enum LinkLine {
    Verbatim(String),
    Link {
        link: DirectoryLink,
        raw: Option<String>,
    },
}

impl LinkLine {
    fn render(&self) -> Cow<'_, str> {
        match self {
            LinkLine::Verbatim(raw) | LinkLine::Link { raw: Some(raw), .. } => {
                Cow::Borrowed(raw)
            }
            LinkLine::Link { link, .. } => Cow::Owned(encode_link(link)),
        }
    }

    fn link(&self) -> Option<&DirectoryLink> {
        match self {
            LinkLine::Link { link, .. } => Some(link),
            LinkLine::Verbatim(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
enum LegacyLine {
    Verbatim(String),
    Entry {
        assignment: LegacyProjectAssignment,
        raw: String,
    },
}

impl LegacyLine {
    fn render(&self) -> Cow<'_, str> {
        match self {
            LegacyLine::Verbatim(raw) | LegacyLine::Entry { raw, .. } => Cow::Borrowed(raw),
        }
    }

    fn assignment(&self) -> Option<&LegacyProjectAssignment> {
        match self {
            LegacyLine::Entry { assignment, .. } => Some(assignment),
            LegacyLine::Verbatim(_) => None,
        }
    }
}

fn parse_links(contents: &str) -> Vec<LinkLine> {
    contents
        .lines()
        .enumerate()
        .map(|(idx, raw)| match decode_link(raw) {
            Ok(Some(link)) => LinkLine::Link {
                link,
                raw: Some(raw.to_string()),
            },
            Ok(None) => LinkLine::Verbatim(raw.to_string()),
            Err(err) => {
                warn!(line = idx + 1, %err, "skipping unreadable link line");
                LinkLine::Verbatim(raw.to_string())
            }
        })
        .collect()
}

fn parse_legacy(contents: &str) -> Vec<LegacyLine> {
    contents
        .lines()
        .enumerate()
        .map(|(idx, raw)| match decode_legacy_assignment(raw) {
            Ok(Some(assignment)) => LegacyLine::Entry {
                assignment,
                raw: raw.to_string(),
            },
            Ok(None) => LegacyLine::Verbatim(raw.to_string()),
            Err(err) => {
                warn!(line = idx + 1, %err, "skipping unreadable legacy project line");
                LegacyLine::Verbatim(raw.to_string())
            }
        })
        .collect()
}

/// What a `link` call changed besides adding the new link.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<DirectoryLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub superseded_legacy: Vec<LegacyProjectAssignment>,
}

/// Directory links plus the read-only legacy basename table.
#[derive(Debug)]
pub struct LinkStore {
    paths: StorePaths,
    lock_timeout: Duration,
    links: Vec<LinkLine>,
    legacy: Vec<LegacyLine>,
}

impl LinkStore {
    pub fn open(paths: &StorePaths, lock_timeout: Duration) -> Result<Self, StoreError> {
        let links = parse_links(&read_file(&paths.links())?);
        let legacy = parse_legacy(&read_file(&paths.projects())?);
        debug!(links = links.len(), legacy = legacy.len(), "loaded directory links");
        Ok(Self {
            paths: paths.clone(),
            lock_timeout,
            links,
            legacy,
        })
    }

    pub fn links(&self) -> Vec<DirectoryLink> {
        self.links.iter().filter_map(LinkLine::link).cloned().collect()
    }

    pub fn legacy(&self) -> Vec<LegacyProjectAssignment> {
        self.legacy
            .iter()
            .filter_map(LegacyLine::assignment)
            .cloned()
            .collect()
    }

    pub fn resolve(&self, cwd: &Path) -> Option<Resolution> {
        resolve(cwd, &self.links(), &self.legacy())
    }

    /// Links `path` (already normalized) to `username`.
    ///
    /// Legacy entries sharing the directory's basename are removed, since the
    /// new link supersedes them.
    pub fn link(
        &mut self,
        path: &Path,
        username: &str,
        mode: LinkMode,
        replace: bool,
    ) -> Result<LinkChange, StoreError> {
        let link = DirectoryLink::new(path.to_path_buf(), username, mode)?;
        self.modify(|links, legacy| {
            let mut change = LinkChange::default();
            match links
                .iter()
                .position(|line| line.link().is_some_and(|l| l.path_prefix == link.path_prefix))
            {
                Some(idx) => {
                    let existing = links[idx].link().cloned();
                    if !replace {
                        return Err(StoreError::DuplicateLink {
                            path: link.path_prefix.clone(),
                            username: existing.map(|l| l.username).unwrap_or_default(),
                        });
                    }
                    change.replaced = existing;
                    links[idx] = LinkLine::Link {
                        link: link.clone(),
                        raw: None,
                    };
                }
                None => links.push(LinkLine::Link {
                    link: link.clone(),
                    raw: None,
                }),
            }
            change.superseded_legacy = drop_legacy_for(legacy, &link.path_prefix);
            info!(path = %link.path_prefix.display(), username = %link.username, mode = %link.mode, "linked directory");
            Ok(change)
        })
    }

    pub fn unlink(&mut self, path: &Path) -> Result<DirectoryLink, StoreError> {
        self.modify(|links, _legacy| {
            let idx = links
                .iter()
                .position(|line| line.link().is_some_and(|l| l.path_prefix == path))
                .ok_or_else(|| StoreError::LinkNotFound(path.to_path_buf()))?;
            match links.remove(idx) {
                LinkLine::Link { link, .. } => {
                    info!(path = %path.display(), "unlinked directory");
                    Ok(link)
                }
                LinkLine::Verbatim(_) => Err(StoreError::LinkNotFound(path.to_path_buf())),
            }
        })
    }

    /// Removes every link pointing at `username`; returns the removed prefixes.
    pub fn unlink_profile(&mut self, username: &str) -> Result<Vec<PathBuf>, StoreError> {
        self.modify(|links, _legacy| {
            let mut removed = Vec::new();
            links.retain(|line| match line.link() {
                Some(link) if link.username == username => {
                    removed.push(link.path_prefix.clone());
                    false
                }
                _ => true,
            });
            Ok(removed)
        })
    }

    pub fn set_mode(&mut self, path: &Path, mode: LinkMode) -> Result<(), StoreError> {
        self.modify(|links, _legacy| {
            let line = links
                .iter_mut()
                .find(|line| line.link().is_some_and(|l| l.path_prefix == path))
                .ok_or_else(|| StoreError::LinkNotFound(path.to_path_buf()))?;
            if let LinkLine::Link { link, raw } = line {
                if link.mode != mode {
                    link.mode = mode;
                    *raw = None;
                    info!(path = %path.display(), %mode, "changed auto-switch mode");
                }
            }
            Ok(())
        })
    }

    /// Converts the legacy entry matching `dir`'s basename into a link with mode `always`.
    pub fn adopt_legacy(&mut self, dir: &Path) -> Result<Option<DirectoryLink>, StoreError> {
        let Some(name) = basename(dir).map(ToOwned::to_owned) else {
            return Ok(None);
        };
        self.modify(|links, legacy| {
            let Some(assignment) = legacy
                .iter()
                .filter_map(LegacyLine::assignment)
                .find(|entry| entry.basename == name)
                .cloned()
            else {
                return Ok(None);
            };
            if let Some(existing) = links
                .iter()
                .filter_map(LinkLine::link)
                .find(|l| l.path_prefix == dir)
            {
                return Err(StoreError::DuplicateLink {
                    path: dir.to_path_buf(),
                    username: existing.username.clone(),
                });
            }
            let link = DirectoryLink::new(dir.to_path_buf(), assignment.username, LinkMode::Always)?;
            links.push(LinkLine::Link {
                link: link.clone(),
                raw: None,
            });
            drop_legacy_for(legacy, dir);
            info!(path = %dir.display(), username = %link.username, "adopted legacy project assignment");
            Ok(Some(link))
        })
    }

    fn modify<T>(
        &mut self,
        change: impl FnOnce(&mut Vec<LinkLine>, &mut Vec<LegacyLine>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = acquire_lock(&self.paths, self.lock_timeout)?;
        let links_path = self.paths.links();
        let projects_path = self.paths.projects();
        let mut links = parse_links(&read_file(&links_path)?);
        let mut legacy = parse_legacy(&read_file(&projects_path)?);
        let legacy_before = legacy.len();

        let out = change(&mut links, &mut legacy)?;

        write_file(&links_path, &render_lines(links.iter().map(LinkLine::render)))?;
        if legacy.len() != legacy_before {
            write_file(
                &projects_path,
                &render_lines(legacy.iter().map(LegacyLine::render)),
            )?;
        }
        self.links = links;
        self.legacy = legacy;
        Ok(out)
    }
}

fn drop_legacy_for(legacy: &mut Vec<LegacyLine>, dir: &Path) -> Vec<LegacyProjectAssignment> {
    let Some(name) = basename(dir) else {
        return Vec::new();
    };
    let mut dropped = Vec::new();
    legacy.retain(|line| match line.assignment() {
        Some(entry) if entry.basename == name => {
            dropped.push(entry.clone());
            false
        }
        _ => true,
    });
    for entry in &dropped {
        info!(basename = %entry.basename, username = %entry.username, "removed superseded legacy project entry");
    }
    dropped
}

#[cfg(test)]
mod tests {
    use std::fs;

    use persona_domain::MatchSource;

    use super::*;

    fn open(paths: &StorePaths) -> LinkStore {
        LinkStore::open(paths, Duration::from_millis(200)).expect("open")
    }

    #[test]
    fn linked_directory_resolves_for_subdirectories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        let mut store = open(&paths);
        store
            .link(Path::new("/home/u/work"), "work-acct", LinkMode::Always, false)
            .expect("link");

        let reopened = open(&paths);
        let hit = reopened
            .resolve(Path::new("/home/u/work/sub"))
            .expect("resolved");
        assert_eq!(hit.username, "work-acct");
        assert_eq!(hit.mode, LinkMode::Always);
        assert_eq!(hit.source, MatchSource::Link);
        assert_eq!(
            fs::read_to_string(paths.links()).expect("read"),
            "/home/u/work|work-acct|always\n"
        );
    }

    #[test]
    fn duplicate_prefixes_need_replace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        let mut store = open(&paths);
        store
            .link(Path::new("/srv"), "alice", LinkMode::Always, false)
            .expect("link");
        let err = store
            .link(Path::new("/srv"), "bob", LinkMode::Ask, false)
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::DuplicateLink { ref username, .. } if username == "alice"));

        let change = store
            .link(Path::new("/srv"), "bob", LinkMode::Ask, true)
            .expect("replace");
        assert_eq!(change.replaced.map(|l| l.username), Some("alice".to_string()));
        assert_eq!(store.links().len(), 1);
        assert_eq!(store.links()[0].username, "bob");
    }

    #[test]
    fn unlink_and_mode_changes_touch_only_their_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        fs::write(
            paths.links(),
            "# links\n/a|alice|always\n/b|bob|sometimes\n/c|carol|ask\n",
        )
        .expect("seed");
        let mut store = open(&paths);
        assert_eq!(store.links().len(), 2);

        store.set_mode(Path::new("/c"), LinkMode::Never).expect("mode");
        store.unlink(Path::new("/a")).expect("unlink");
        assert!(matches!(
            store.unlink(Path::new("/a")),
            Err(StoreError::LinkNotFound(_))
        ));
        assert_eq!(
            fs::read_to_string(paths.links()).expect("read"),
            "# links\n/b|bob|sometimes\n/c|carol|never\n"
        );
    }

    #[test]
    fn legacy_entries_fall_back_and_are_superseded_by_links() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        fs::write(paths.projects(), "webapp=old-acct\napi=api-acct\n").expect("seed");
        let mut store = open(&paths);

        let hit = store.resolve(Path::new("/code/webapp")).expect("legacy");
        assert_eq!(hit.source, MatchSource::Legacy);

        let change = store
            .link(Path::new("/code/webapp"), "new-acct", LinkMode::Ask, false)
            .expect("link");
        assert_eq!(change.superseded_legacy.len(), 1);
        assert_eq!(
            fs::read_to_string(paths.projects()).expect("read"),
            "api=api-acct\n"
        );
        let hit = store.resolve(Path::new("/code/webapp")).expect("link");
        assert_eq!((hit.username.as_str(), hit.source), ("new-acct", MatchSource::Link));
    }

    #[test]
    fn adopt_converts_the_current_directory_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        fs::write(paths.projects(), "webapp=old-acct\n").expect("seed");
        let mut store = open(&paths);

        assert_eq!(store.adopt_legacy(Path::new("/code/other")).expect("noop"), None);
        let adopted = store
            .adopt_legacy(Path::new("/code/webapp"))
            .expect("adopt")
            .expect("entry");
        assert_eq!(adopted.mode, LinkMode::Always);
        assert_eq!(adopted.username, "old-acct");
        assert!(store.legacy().is_empty());
        assert_eq!(
            fs::read_to_string(paths.links()).expect("read"),
            "/code/webapp|old-acct|always\n"
        );
    }

    #[test]
    fn unlink_profile_removes_every_link_for_a_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        let mut store = open(&paths);
        for (path, user) in [("/a", "alice"), ("/b", "bob"), ("/c", "alice")] {
            store
                .link(Path::new(path), user, LinkMode::Always, false)
                .expect("link");
        }
        let removed = store.unlink_profile("alice").expect("unlink");
        assert_eq!(removed, [PathBuf::from("/a"), PathBuf::from("/c")]);
        assert_eq!(store.links().len(), 1);
    }
}
