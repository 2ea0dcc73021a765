use crate::profile::{Profile, DEFAULT_HOST};

use super::{encode_b64, join_escaped, FormatVersion, DELIMITER};

/// `user=Display Name|email`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordV0 {
    pub username: String,
    pub display_name: String,
    pub email: String,
}

/// `user:Display Name:email[:ssh_key]`, the colon-separated sibling of v0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordColon {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub ssh_key_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordV1 {
    pub username: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordV2 {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub ssh_key_path: Option<String>,
    pub gpg_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordV3 {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub ssh_key_path: Option<String>,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    V0(RecordV0),
    V0Colon(RecordColon),
    V1(RecordV1),
    V2(RecordV2),
    V3(RecordV3),
}

impl From<RecordV0> for RecordV1 {
    fn from(record: RecordV0) -> Self {
        Self {
            username: record.username,
            display_name: record.display_name,
            email: record.email,
        }
    }
}

impl From<RecordV1> for RecordV2 {
    fn from(record: RecordV1) -> Self {
        Self {
            username: record.username,
            display_name: record.display_name,
            email: record.email,
            ssh_key_path: None,
            gpg_key: None,
        }
    }
}

impl From<RecordColon> for RecordV2 {
    fn from(record: RecordColon) -> Self {
        Self {
            username: record.username,
            display_name: record.display_name,
            email: record.email,
            ssh_key_path: record.ssh_key_path,
            gpg_key: None,
        }
    }
}

// v3 has no signing column; the gpg key is reported by `StoredRecord::gpg_key` before this runs.
impl From<RecordV2> for RecordV3 {
    fn from(record: RecordV2) -> Self {
        Self {
            username: record.username,
            display_name: record.display_name,
            email: record.email,
            ssh_key_path: record.ssh_key_path,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

impl StoredRecord {
    pub fn version(&self) -> FormatVersion {
        match self {
            StoredRecord::V0(_) => FormatVersion::V0,
            StoredRecord::V0Colon(_) => FormatVersion::V0Colon,
            StoredRecord::V1(_) => FormatVersion::V1,
            StoredRecord::V2(_) => FormatVersion::V2,
            StoredRecord::V3(_) => FormatVersion::V3,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            StoredRecord::V0(record) => &record.username,
            StoredRecord::V0Colon(record) => &record.username,
            StoredRecord::V1(record) => &record.username,
            StoredRecord::V2(record) => &record.username,
            StoredRecord::V3(record) => &record.username,
        }
    }

    pub fn gpg_key(&self) -> Option<&str> {
        match self {
            StoredRecord::V2(record) => record.gpg_key.as_deref(),
            _ => None,
        }
    }

    /// Walks the migration chain up to the current record shape.
    pub fn upgrade(self) -> RecordV3 {
        match self {
            StoredRecord::V0(record) => RecordV2::from(RecordV1::from(record)).into(),
            StoredRecord::V0Colon(record) => RecordV2::from(record).into(),
            StoredRecord::V1(record) => RecordV2::from(record).into(),
            StoredRecord::V2(record) => record.into(),
            StoredRecord::V3(record) => record,
        }
    }

    /// Upgrades to the in-memory profile, remembering which layout it came from.
    pub fn into_profile(self) -> Profile {
        let format_version = self.version();
        let record = self.upgrade();
        Profile {
            username: record.username,
            display_name: record.display_name,
            email: record.email,
            ssh_key_path: record.ssh_key_path,
            host: record.host,
            format_version,
        }
    }

    /// Projects a profile onto the layout named by its `format_version`.
    pub fn from_profile(profile: &Profile) -> Self {
        let username = profile.username.clone();
        let display_name = profile.display_name.clone();
        let email = profile.email.clone();
        match profile.format_version {
            FormatVersion::V0 => StoredRecord::V0(RecordV0 {
                username,
                display_name,
                email,
            }),
            FormatVersion::V0Colon => StoredRecord::V0Colon(RecordColon {
                username,
                display_name,
                email,
                ssh_key_path: profile.ssh_key_path.clone(),
            }),
            FormatVersion::V1 => StoredRecord::V1(RecordV1 {
                username,
                display_name,
                email,
            }),
            FormatVersion::V2 => StoredRecord::V2(RecordV2 {
                username,
                display_name,
                email,
                ssh_key_path: profile.ssh_key_path.clone(),
                gpg_key: None,
            }),
            FormatVersion::V3 => StoredRecord::V3(RecordV3 {
                username,
                display_name,
                email,
                ssh_key_path: profile.ssh_key_path.clone(),
                host: profile.host.clone(),
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            StoredRecord::V0(record) => format!(
                "{}={}{DELIMITER}{}",
                record.username, record.display_name, record.email
            ),
            StoredRecord::V0Colon(record) => {
                let mut line = format!(
                    "{}:{}:{}",
                    record.username, record.display_name, record.email
                );
                if let Some(path) = &record.ssh_key_path {
                    line.push(':');
                    line.push_str(path);
                }
                line
            }
            StoredRecord::V1(record) => join_escaped(&[
                record.username.as_str(),
                "v1",
                encode_b64(&record.display_name).as_str(),
                encode_b64(&record.email).as_str(),
            ]),
            StoredRecord::V2(record) => join_escaped(&[
                record.username.as_str(),
                "v2",
                encode_b64(&record.display_name).as_str(),
                encode_b64(&record.email).as_str(),
                encode_b64(record.ssh_key_path.as_deref().unwrap_or_default()).as_str(),
                encode_b64(record.gpg_key.as_deref().unwrap_or_default()).as_str(),
            ]),
            StoredRecord::V3(record) => join_escaped(&[
                record.username.as_str(),
                "v3",
                record.display_name.as_str(),
                record.email.as_str(),
                record.ssh_key_path.as_deref().unwrap_or_default(),
                record.host.as_str(),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_step_of_the_chain_is_lossless_for_identity() {
        let v0 = RecordV0 {
            username: "dana".into(),
            display_name: "Dana".into(),
            email: "dana@d.dev".into(),
        };
        let v1 = RecordV1::from(v0);
        assert_eq!(v1.email, "dana@d.dev");
        let v2 = RecordV2::from(v1);
        assert_eq!(v2.ssh_key_path, None);
        assert_eq!(v2.gpg_key, None);
        let v3 = RecordV3::from(v2);
        assert_eq!(v3.display_name, "Dana");
        assert_eq!(v3.host, DEFAULT_HOST);
    }

    #[test]
    fn colon_dialect_keeps_its_ssh_key() {
        let record = StoredRecord::V0Colon(RecordColon {
            username: "erin".into(),
            display_name: "Erin".into(),
            email: "erin@e.org".into(),
            ssh_key_path: Some("/k/erin".into()),
        });
        let upgraded = record.upgrade();
        assert_eq!(upgraded.ssh_key_path.as_deref(), Some("/k/erin"));
    }
}
