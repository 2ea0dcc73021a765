//! Line codecs for the profile file.
//!
//! Every historical layout decodes into its own [`StoredRecord`] variant. The
//! variants are upgraded by an ordered chain of pure conversions
//! (`v0 → v1 → v2 → v3`, with the colon dialect joining at `v2`) so each step
//! can be tested on its own. Only [`CURRENT_VERSION`] is ever produced by a
//! write; older encoders exist so untouched lines keep their exact bytes.
//!
//! | version  | layout                                              |
//! |----------|-----------------------------------------------------|
//! | v0       | `user=Display Name\|email`                           |
//! | v0-colon | `user:Display Name:email[:ssh_key]`                 |
//! | v1       | `user\|v1\|b64(name)\|b64(email)`                     |
//! | v2       | `user\|v2\|b64(name)\|b64(email)\|b64(ssh)\|b64(gpg)`  |
//! | v3       | `user\|v3\|name\|email\|ssh\|host` with `\` escapes     |

mod escape;
mod records;

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::profile::{validate_username, Profile, ValidationError};

pub(crate) use escape::{join_escaped, split_escaped};
pub use records::{RecordColon, RecordV0, RecordV1, RecordV2, RecordV3, StoredRecord};

pub const DELIMITER: char = '|';
pub const ESCAPE: char = '\\';
pub const CURRENT_VERSION: FormatVersion = FormatVersion::V3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FormatVersion {
    #[serde(rename = "v0")]
    V0,
    #[serde(rename = "v0-colon")]
    V0Colon,
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v2")]
    V2,
    #[serde(rename = "v3")]
    V3,
}

impl FormatVersion {
    pub const ALL: [FormatVersion; 5] = [
        FormatVersion::V0,
        FormatVersion::V0Colon,
        FormatVersion::V1,
        FormatVersion::V2,
        FormatVersion::V3,
    ];

    /// Numeric generation; both unversioned dialects count as zero.
    pub fn number(self) -> u32 {
        match self {
            FormatVersion::V0 | FormatVersion::V0Colon => 0,
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
            FormatVersion::V3 => 3,
        }
    }

    fn from_tag_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(FormatVersion::V1),
            2 => Some(FormatVersion::V2),
            3 => Some(FormatVersion::V3),
            _ => None,
        }
    }

    fn expected_fields(self) -> &'static str {
        match self {
            FormatVersion::V0 => "2",
            FormatVersion::V0Colon => "3 or 4",
            FormatVersion::V1 => "4",
            FormatVersion::V2 | FormatVersion::V3 => "6",
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatVersion::V0 => "v0",
            FormatVersion::V0Colon => "v0-colon",
            FormatVersion::V1 => "v1",
            FormatVersion::V2 => "v2",
            FormatVersion::V3 => "v3",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown format version tag `v{0}`")]
    UnknownVersion(u32),
    #[error("{version} lines have {expected} fields, found {found}")]
    FieldCount {
        version: FormatVersion,
        expected: &'static str,
        found: usize,
    },
    #[error("line ends with a dangling `\\` escape")]
    DanglingEscape,
    #[error("{field} column of a {version} line is not valid base64 text")]
    Base64 {
        version: FormatVersion,
        field: &'static str,
    },
    #[error("stored {0}")]
    Username(ValidationError),
    #[error("line does not match any known profile layout")]
    Unrecognized,
}

/// Parses one stored line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<StoredRecord>, DecodeError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    // Usernames and tags never need escaping, so the raw second column is enough to spot a tag.
    if let Some(number) = line.split(DELIMITER).nth(1).and_then(version_tag) {
        let version = FormatVersion::from_tag_number(number)
            .ok_or(DecodeError::UnknownVersion(number))?;
        let fields = split_escaped(line)?;
        return decode_versioned(version, &fields).map(Some);
    }

    if let Some((user, rest)) = line.split_once('=') {
        if !user.contains(DELIMITER) && !user.contains(':') {
            return decode_v0(user, rest).map(Some);
        }
    }

    if !line.contains(DELIMITER) && line.contains(':') {
        return decode_colon(line).map(Some);
    }

    Err(DecodeError::Unrecognized)
}

/// Parses one stored line straight into a [`Profile`] carrying its source version.
pub fn decode_line(line: &str) -> Result<Option<Profile>, DecodeError> {
    Ok(parse_line(line)?.map(StoredRecord::into_profile))
}

/// Serializes a profile in the layout named by its `format_version`.
pub fn encode_line(profile: &Profile) -> String {
    StoredRecord::from_profile(profile).encode()
}

/// Re-stamps a profile with the current format; the next write uses the v3 layout.
pub fn migrate(profile: Profile) -> Profile {
    profile.into_current()
}

/// Best-effort look at the leading username and `vN` tag of a line that failed to decode.
pub fn peek_header(line: &str) -> Option<(String, Option<u32>)> {
    let fields = split_escaped(line).ok()?;
    let user = fields.first()?.clone();
    if validate_username(&user).is_err() {
        return None;
    }
    Some((user, fields.get(1).and_then(|tag| version_tag(tag))))
}

fn version_tag(field: &str) -> Option<u32> {
    let digits = field.strip_prefix('v')?;
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn check_username(user: &str) -> Result<String, DecodeError> {
    validate_username(user).map_err(DecodeError::Username)?;
    Ok(user.to_string())
}

fn check_count(version: FormatVersion, found: usize, allowed: &[usize]) -> Result<(), DecodeError> {
    if allowed.contains(&found) {
        Ok(())
    } else {
        Err(DecodeError::FieldCount {
            version,
            expected: version.expected_fields(),
            found,
        })
    }
}

fn decode_v0(user: &str, rest: &str) -> Result<StoredRecord, DecodeError> {
    let parts: Vec<&str> = rest.split(DELIMITER).collect();
    check_count(FormatVersion::V0, parts.len(), &[2])?;
    Ok(StoredRecord::V0(RecordV0 {
        username: check_username(user)?,
        display_name: parts[0].to_string(),
        email: parts[1].to_string(),
    }))
}

fn decode_colon(line: &str) -> Result<StoredRecord, DecodeError> {
    let parts: Vec<&str> = line.splitn(4, ':').collect();
    check_count(FormatVersion::V0Colon, parts.len(), &[3, 4])?;
    Ok(StoredRecord::V0Colon(RecordColon {
        username: check_username(parts[0])?,
        display_name: parts[1].to_string(),
        email: parts[2].to_string(),
        ssh_key_path: parts
            .get(3)
            .map(|path| (*path).to_string())
            .filter(|path| !path.is_empty()),
    }))
}

fn decode_versioned(version: FormatVersion, fields: &[String]) -> Result<StoredRecord, DecodeError> {
    match version {
        FormatVersion::V1 => {
            check_count(version, fields.len(), &[4])?;
            Ok(StoredRecord::V1(RecordV1 {
                username: check_username(&fields[0])?,
                display_name: decode_b64(version, "name", &fields[2])?,
                email: decode_b64(version, "email", &fields[3])?,
            }))
        }
        FormatVersion::V2 => {
            check_count(version, fields.len(), &[6])?;
            Ok(StoredRecord::V2(RecordV2 {
                username: check_username(&fields[0])?,
                display_name: decode_b64(version, "name", &fields[2])?,
                email: decode_b64(version, "email", &fields[3])?,
                ssh_key_path: optional(decode_b64(version, "ssh", &fields[4])?),
                gpg_key: optional(decode_b64(version, "gpg", &fields[5])?),
            }))
        }
        FormatVersion::V3 => {
            check_count(version, fields.len(), &[6])?;
            Ok(StoredRecord::V3(RecordV3 {
                username: check_username(&fields[0])?,
                display_name: fields[2].clone(),
                email: fields[3].clone(),
                ssh_key_path: optional(fields[4].clone()),
                host: if fields[5].is_empty() {
                    crate::profile::DEFAULT_HOST.to_string()
                } else {
                    fields[5].clone()
                },
            }))
        }
        FormatVersion::V0 | FormatVersion::V0Colon => Err(DecodeError::Unrecognized),
    }
}

fn decode_b64(
    version: FormatVersion,
    field: &'static str,
    raw: &str,
) -> Result<String, DecodeError> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|_| DecodeError::Base64 { version, field })?;
    String::from_utf8(bytes).map_err(|_| DecodeError::Base64 { version, field })
}

pub(crate) fn encode_b64(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

fn optional(value: String) -> Option<String> {
    crate::profile::non_empty(value)
}
