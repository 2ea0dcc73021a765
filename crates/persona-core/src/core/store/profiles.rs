use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use persona_domain::{encode_line, parse_line, peek_header, FormatVersion, Profile, CURRENT_VERSION};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{acquire_lock, read_file, render_lines, write_file, StoreError, StorePaths};

/// A line that could not be decoded. It stays in the file untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptLine {
    pub line: usize,
    pub raw: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_tag: Option<u32>,
}

impl CorruptLine {
    /// Written by a newer persona; rewriting it would lose fields.
    #[must_use]
    pub fn is_newer_format(&self) -> bool {
        self.version_tag
            .is_some_and(|tag| tag > CURRENT_VERSION.number())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigratedRecord {
    pub username: String,
    pub from: FormatVersion,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub migrated: Vec<MigratedRecord>,
    pub warnings: Vec<String>,
    pub dropped: Vec<CorruptLine>,
    pub kept_corrupt: Vec<CorruptLine>,
    pub dry_run: bool,
}

impl MigrationReport {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.migrated.is_empty() || !self.dropped.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Verbatim(String),
    Record {
        profile: Profile,
        gpg_key: Option<String>,
        /// Original bytes; `None` once the record has been rewritten.
        raw: Option<String>,
    },
    Corrupt(CorruptLine),
}

impl Entry {
    fn render(&self) -> Cow<'_, str> {
        match self {
            Entry::Verbatim(raw) | Entry::Record { raw: Some(raw), .. } => Cow::Borrowed(raw),
            Entry::Record { profile, .. } => Cow::Owned(encode_line(profile)),
            Entry::Corrupt(corrupt) => Cow::Borrowed(&corrupt.raw),
        }
    }

    fn profile(&self) -> Option<&Profile> {
        match self {
            Entry::Record { profile, .. } => Some(profile),
            _ => None,
        }
    }

    fn fresh(profile: Profile) -> Self {
        Entry::Record {
            profile,
            gpg_key: None,
            raw: None,
        }
    }
}

fn parse_entries(contents: &str) -> Vec<Entry> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut entries = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = idx + 1;
        let entry = match parse_line(raw) {
            Ok(None) => Entry::Verbatim(raw.to_string()),
            Ok(Some(record)) => {
                if let Some(first) = seen.get(record.username()) {
                    warn!(line, first, username = record.username(), "duplicate profile ignored");
                    Entry::Corrupt(CorruptLine {
                        line,
                        raw: raw.to_string(),
                        reason: format!("duplicate of the profile on line {first}"),
                        username: Some(record.username().to_string()),
                        version_tag: None,
                    })
                } else {
                    seen.insert(record.username().to_string(), line);
                    let gpg_key = record.gpg_key().map(ToOwned::to_owned);
                    Entry::Record {
                        profile: record.into_profile(),
                        gpg_key,
                        raw: Some(raw.to_string()),
                    }
                }
            }
            Err(err) => {
                warn!(line, %err, "skipping unreadable profile line");
                let header = peek_header(raw);
                Entry::Corrupt(CorruptLine {
                    line,
                    raw: raw.to_string(),
                    reason: err.to_string(),
                    username: header.as_ref().map(|(user, _)| user.clone()),
                    version_tag: header.and_then(|(_, tag)| tag),
                })
            }
        };
        entries.push(entry);
    }
    entries
}

fn refuse_newer(entries: &[Entry], username: &str) -> Result<(), StoreError> {
    let newer = entries.iter().find_map(|entry| match entry {
        Entry::Corrupt(corrupt)
            if corrupt.is_newer_format() && corrupt.username.as_deref() == Some(username) =>
        {
            Some(corrupt)
        }
        _ => None,
    });
    match newer {
        Some(corrupt) => Err(StoreError::NewerFormat {
            username: username.to_string(),
            line: corrupt.line,
            found: corrupt.version_tag.unwrap_or_default(),
            supported: CURRENT_VERSION.number(),
        }),
        None => Ok(()),
    }
}

fn position(entries: &[Entry], username: &str) -> Option<usize> {
    entries
        .iter()
        .position(|entry| entry.profile().is_some_and(|p| p.username == username))
}

fn migrate_entries(entries: &mut Vec<Entry>, drop_corrupt: bool) -> MigrationReport {
    let mut report = MigrationReport::default();
    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries.drain(..) {
        match entry {
            Entry::Record {
                profile,
                gpg_key,
                raw,
            } => {
                if profile.is_current() {
                    kept.push(Entry::Record {
                        profile,
                        gpg_key,
                        raw,
                    });
                    continue;
                }
                if let Err(err) = profile.validate() {
                    warn!(username = %profile.username, %err, "legacy profile left in its old layout");
                    report.warnings.push(format!(
                        "profile `{}` stays in its {} layout: {err}; fix it with `persona edit`",
                        profile.username, profile.format_version
                    ));
                    kept.push(Entry::Record {
                        profile,
                        gpg_key,
                        raw,
                    });
                    continue;
                }
                if let Some(key) = gpg_key {
                    report.warnings.push(format!(
                        "profile `{}` had GPG signing key {key}; the current format does not store it, \
                         set `git config user.signingkey {key}` by hand",
                        profile.username
                    ));
                }
                report.migrated.push(MigratedRecord {
                    username: profile.username.clone(),
                    from: profile.format_version,
                });
                kept.push(Entry::fresh(profile.into_current()));
            }
            Entry::Corrupt(corrupt) => {
                if drop_corrupt && !corrupt.is_newer_format() {
                    report.dropped.push(corrupt);
                } else {
                    report.kept_corrupt.push(corrupt.clone());
                    kept.push(Entry::Corrupt(corrupt));
                }
            }
            verbatim @ Entry::Verbatim(_) => kept.push(verbatim),
        }
    }
    *entries = kept;
    report
}

/// Versioned profile records in file order.
#[derive(Debug)]
pub struct ProfileStore {
    paths: StorePaths,
    path: PathBuf,
    lock_timeout: Duration,
    entries: Vec<Entry>,
}

impl ProfileStore {
    pub fn open(paths: &StorePaths, lock_timeout: Duration) -> Result<Self, StoreError> {
        let path = paths.profiles();
        let entries = parse_entries(&read_file(&path)?);
        debug!(path = %path.display(), lines = entries.len(), "loaded profiles");
        Ok(Self {
            paths: paths.clone(),
            path,
            lock_timeout,
            entries,
        })
    }

    pub fn get(&self, username: &str) -> Result<&Profile, StoreError> {
        self.find(username)
            .ok_or_else(|| StoreError::NotFound(username.to_string()))
    }

    pub fn find(&self, username: &str) -> Option<&Profile> {
        self.list().find(|profile| profile.username == username)
    }

    /// Profiles in line order.
    pub fn list(&self) -> impl Iterator<Item = &Profile> {
        self.entries.iter().filter_map(Entry::profile)
    }

    pub fn corruptions(&self) -> impl Iterator<Item = &CorruptLine> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Corrupt(corrupt) => Some(corrupt),
            _ => None,
        })
    }

    /// Records still stored in an older layout.
    pub fn legacy_count(&self) -> usize {
        self.list().filter(|profile| !profile.is_current()).count()
    }

    /// Adds a profile that must not exist yet.
    pub fn insert(&mut self, profile: Profile) -> Result<(), StoreError> {
        profile.validate()?;
        let profile = profile.into_current();
        self.modify(|entries| {
            refuse_newer(entries, &profile.username)?;
            if position(entries, &profile.username).is_some() {
                return Err(StoreError::AlreadyExists(profile.username.clone()));
            }
            info!(username = %profile.username, "adding profile");
            entries.push(Entry::fresh(profile));
            Ok(())
        })
    }

    /// Replaces the record with the same username, or appends it.
    ///
    /// The record is always written in the current format.
    pub fn put(&mut self, profile: Profile) -> Result<(), StoreError> {
        profile.validate()?;
        let profile = profile.into_current();
        self.modify(|entries| {
            refuse_newer(entries, &profile.username)?;
            match position(entries, &profile.username) {
                Some(idx) => {
                    if let Entry::Record {
                        gpg_key: Some(key), ..
                    } = &entries[idx]
                    {
                        warn!(username = %profile.username, %key, "dropping stored GPG key on rewrite");
                    }
                    info!(username = %profile.username, "updating profile");
                    entries[idx] = Entry::fresh(profile);
                }
                None => {
                    info!(username = %profile.username, "adding profile");
                    entries.push(Entry::fresh(profile));
                }
            }
            Ok(())
        })
    }

    pub fn remove(&mut self, username: &str) -> Result<Profile, StoreError> {
        self.modify(|entries| {
            refuse_newer(entries, username)?;
            let idx = position(entries, username)
                .ok_or_else(|| StoreError::NotFound(username.to_string()))?;
            let removed = entries.remove(idx);
            info!(%username, "removed profile");
            match removed {
                Entry::Record { profile, .. } => Ok(profile),
                _ => Err(StoreError::NotFound(username.to_string())),
            }
        })
    }

    /// Rewrites every legacy record in the current format.
    ///
    /// Corrupt lines stay unless `drop_corrupt` is set; lines written by a
    /// newer format are kept either way.
    pub fn migrate_all(
        &mut self,
        drop_corrupt: bool,
        dry_run: bool,
    ) -> Result<MigrationReport, StoreError> {
        if dry_run {
            let mut entries = self.entries.clone();
            let mut report = migrate_entries(&mut entries, drop_corrupt);
            report.dry_run = true;
            return Ok(report);
        }
        self.modify(|entries| Ok(migrate_entries(entries, drop_corrupt)))
    }

    fn modify<T>(
        &mut self,
        change: impl FnOnce(&mut Vec<Entry>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = acquire_lock(&self.paths, self.lock_timeout)?;
        let mut entries = parse_entries(&read_file(&self.path)?);
        let out = change(&mut entries)?;
        write_file(&self.path, &render_lines(entries.iter().map(Entry::render)))?;
        self.entries = entries;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::fs::FileLock;

    fn store_in(dir: &tempfile::TempDir) -> (StorePaths, ProfileStore) {
        let paths = StorePaths::new(dir.path().to_path_buf());
        let store = ProfileStore::open(&paths, Duration::from_millis(200)).expect("open");
        (paths, store)
    }

    fn alice() -> Profile {
        Profile::new("alice", "Alice A", "alice@x.com").with_ssh_key("~/.ssh/id_alice")
    }

    #[test]
    fn put_then_get_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (paths, mut store) = store_in(&dir);
        store.put(alice()).expect("put");
        assert_eq!(store.get("alice").expect("get"), &alice());

        let reopened = ProfileStore::open(&paths, Duration::from_millis(200)).expect("reopen");
        assert_eq!(reopened.get("alice").expect("get"), &alice());
        assert_eq!(
            fs::read_to_string(paths.profiles()).expect("read"),
            "alice|v3|Alice A|alice@x.com|~/.ssh/id_alice|github.com\n"
        );
    }

    #[test]
    fn invalid_fields_are_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (paths, mut store) = store_in(&dir);
        let err = store
            .put(Profile::new("alice", "Alice", "not-an-email"))
            .expect_err("invalid");
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(!paths.profiles().exists());
    }

    #[test]
    fn untouched_lines_keep_their_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        let original = "# my identities\nbob=Bob B|bob@b.com\nthis line is junk\n\ncarol:Carol:carol@c.io\n";
        fs::write(paths.profiles(), original).expect("seed");

        let mut store = ProfileStore::open(&paths, Duration::from_millis(200)).expect("open");
        assert_eq!(store.get("bob").expect("bob").format_version, FormatVersion::V0);
        assert_eq!(store.corruptions().count(), 1);
        assert_eq!(store.legacy_count(), 2);

        store.put(alice()).expect("put");
        let written = fs::read_to_string(paths.profiles()).expect("read");
        assert_eq!(
            written,
            format!("{original}alice|v3|Alice A|alice@x.com|~/.ssh/id_alice|github.com\n")
        );

        let edited = store.get("bob").expect("bob").clone().with_host("ghe.corp.com");
        store.put(edited).expect("edit bob");
        let written = fs::read_to_string(paths.profiles()).expect("read");
        assert!(written.contains("bob|v3|Bob B|bob@b.com||ghe.corp.com\n"));
        assert!(written.contains("this line is junk\n"));
        assert!(written.contains("carol:Carol:carol@c.io\n"));
        assert!(!written.contains("bob=Bob B"));
    }

    #[test]
    fn newer_records_are_never_downgraded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        let newer = "carol|v9|Carol|carol@c.io|||some-future-column";
        fs::write(paths.profiles(), format!("{newer}\n")).expect("seed");

        let mut store = ProfileStore::open(&paths, Duration::from_millis(200)).expect("open");
        assert!(store.get("carol").is_err());

        let err = store
            .put(Profile::new("carol", "Carol", "carol@c.io"))
            .expect_err("refused");
        assert!(matches!(
            err,
            StoreError::NewerFormat {
                found: 9,
                supported: 3,
                line: 1,
                ..
            }
        ));
        assert!(matches!(
            store.remove("carol"),
            Err(StoreError::NewerFormat { .. })
        ));

        store.put(alice()).expect("unrelated put");
        let report = store.migrate_all(true, false).expect("migrate");
        assert_eq!(report.kept_corrupt.len(), 1);
        assert!(report.dropped.is_empty());
        assert!(fs::read_to_string(paths.profiles())
            .expect("read")
            .starts_with(newer));
    }

    #[test]
    fn insert_and_remove_report_conflicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_paths, mut store) = store_in(&dir);
        store.insert(alice()).expect("insert");
        assert!(matches!(
            store.insert(alice()),
            Err(StoreError::AlreadyExists(name)) if name == "alice"
        ));
        assert_eq!(store.remove("alice").expect("remove").username, "alice");
        assert!(matches!(store.remove("alice"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn writes_reread_the_file_under_the_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (paths, mut first) = store_in(&dir);
        let mut second = ProfileStore::open(&paths, Duration::from_millis(200)).expect("open");

        second
            .put(Profile::new("bob", "Bob", "bob@b.com"))
            .expect("second writer");
        first.put(alice()).expect("first writer");

        let names: Vec<_> = first.list().map(|p| p.username.as_str()).collect();
        assert_eq!(names, ["bob", "alice"]);
    }

    #[test]
    fn held_lock_surfaces_a_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (paths, mut store) = store_in(&dir);
        let _held = FileLock::try_acquire(&paths.lock())
            .expect("lock")
            .expect("free");
        let err = store.put(alice()).expect_err("timeout");
        assert!(matches!(err, StoreError::LockTimeout { waited_ms: 200, .. }));
        assert!(!paths.profiles().exists());
    }

    #[test]
    fn migrate_all_upgrades_legacy_lines_and_reports_gpg_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        // v2 with name "Dan", email "dan@d.dev", no ssh, gpg "ABCD1234"
        let contents = "bob=Bob B|bob@b.com\ndan|v2|RGFu|ZGFuQGQuZGV2||QUJDRDEyMzQ=\nbroken|v3|x\n";
        fs::write(paths.profiles(), contents).expect("seed");
        let mut store = ProfileStore::open(&paths, Duration::from_millis(200)).expect("open");

        let preview = store.migrate_all(false, true).expect("dry run");
        assert!(preview.dry_run);
        assert_eq!(preview.migrated.len(), 2);
        assert_eq!(
            fs::read_to_string(paths.profiles()).expect("read"),
            contents,
            "dry run must not write"
        );

        let report = store.migrate_all(true, false).expect("migrate");
        assert_eq!(report.migrated.len(), 2);
        assert_eq!(report.migrated[0].from, FormatVersion::V0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("ABCD1234"));
        assert_eq!(report.dropped.len(), 1);

        assert_eq!(
            fs::read_to_string(paths.profiles()).expect("read"),
            "bob|v3|Bob B|bob@b.com||github.com\ndan|v3|Dan|dan@d.dev||github.com\n"
        );
        assert_eq!(store.legacy_count(), 0);
        assert!(store.migrate_all(false, false).expect("again").migrated.is_empty());
    }

    #[test]
    fn migrate_all_keeps_legacy_records_that_would_not_validate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        // v1 whose name decodes to "Bob\nB"
        let contents = "bob|v1|Qm9iCkI=|Ym9iQGIuY29t\ncarol=Carol|carol@c.io\n";
        fs::write(paths.profiles(), contents).expect("seed");
        let mut store = ProfileStore::open(&paths, Duration::from_millis(200)).expect("open");

        let report = store.migrate_all(false, false).expect("migrate");
        assert_eq!(report.migrated.len(), 1);
        assert_eq!(report.migrated[0].username, "carol");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("`bob`"), "{:?}", report.warnings);

        let written = fs::read_to_string(paths.profiles()).expect("read");
        assert_eq!(
            written,
            "bob|v1|Qm9iCkI=|Ym9iQGIuY29t\ncarol|v3|Carol|carol@c.io||github.com\n"
        );
        let reopened = ProfileStore::open(&paths, Duration::from_millis(200)).expect("reopen");
        assert_eq!(reopened.get("bob").expect("bob").display_name, "Bob\nB");
        assert_eq!(reopened.corruptions().count(), 0);
    }

    #[test]
    fn duplicate_usernames_keep_the_first_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().to_path_buf());
        fs::write(
            paths.profiles(),
            "bob=Bob B|bob@b.com\nbob=Robert|robert@b.com\n",
        )
        .expect("seed");
        let store = ProfileStore::open(&paths, Duration::from_millis(200)).expect("open");
        assert_eq!(store.get("bob").expect("bob").display_name, "Bob B");
        let corrupt: Vec<_> = store.corruptions().collect();
        assert_eq!(corrupt.len(), 1);
        assert_eq!(corrupt[0].line, 2);
    }
}
