#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod format;
pub mod link;
pub mod profile;
pub mod resolver;

pub use format::{
    decode_line, encode_line, migrate, parse_line, peek_header, DecodeError, FormatVersion,
    RecordColon, RecordV0, RecordV1, RecordV2, RecordV3, StoredRecord, CURRENT_VERSION, DELIMITER,
    ESCAPE,
};
pub use link::{
    basename, decode_legacy_assignment, decode_link, encode_link, normalize_path,
    DirectoryLink, LegacyProjectAssignment, LinkDecodeError, LinkMode,
};
pub use profile::{
    validate_display_name, validate_email, validate_host, validate_ssh_key_path,
    validate_username, Field, Profile, ValidationError, DEFAULT_HOST,
};
pub use resolver::{resolve, MatchSource, Resolution};
