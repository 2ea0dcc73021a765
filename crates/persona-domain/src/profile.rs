//! Identity records and the field grammar they must satisfy before being written.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::format::{FormatVersion, CURRENT_VERSION, DELIMITER};

pub const DEFAULT_HOST: &str = "github.com";

const USERNAME_MAX: usize = 39;
const EMAIL_MAX: usize = 254;
const DISPLAY_NAME_MAX: usize = 200;
const HOST_MAX: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_path: Option<String>,
    pub host: String,
    pub format_version: FormatVersion,
}

impl Profile {
    pub fn new(
        username: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
            email: email.into(),
            ssh_key_path: None,
            host: DEFAULT_HOST.to_string(),
            format_version: CURRENT_VERSION,
        }
    }

    #[must_use]
    pub fn with_ssh_key(mut self, path: impl Into<String>) -> Self {
        self.ssh_key_path = non_empty(path.into());
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Checks every field against the write-time grammar.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_display_name(&self.display_name)?;
        validate_email(&self.email)?;
        if let Some(path) = &self.ssh_key_path {
            validate_ssh_key_path(path)?;
        }
        validate_host(&self.host)
    }

    pub fn is_current(&self) -> bool {
        self.format_version == CURRENT_VERSION
    }

    /// Returns the same identity stamped with the current format version.
    #[must_use]
    pub fn into_current(mut self) -> Self {
        self.format_version = CURRENT_VERSION;
        self
    }
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Username,
    DisplayName,
    Email,
    SshKeyPath,
    Host,
    Path,
    Mode,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let fail = |reason: &str| Err(ValidationError::new(Field::Username, reason));
    if username.is_empty() {
        return fail("must not be empty");
    }
    if username.chars().count() > USERNAME_MAX {
        return fail("must be at most 39 characters");
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
    {
        return fail("may only contain ASCII letters, digits and hyphens");
    }
    if username.starts_with('-') || username.ends_with('-') {
        return fail("must not start or end with a hyphen");
    }
    if username.contains("--") {
        return fail("must not contain consecutive hyphens");
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let fail = |reason: String| Err(ValidationError::new(Field::DisplayName, reason));
    if name.trim().is_empty() {
        return fail("must not be empty".to_string());
    }
    if name.chars().count() > DISPLAY_NAME_MAX {
        return fail(format!("must be at most {DISPLAY_NAME_MAX} characters"));
    }
    if name.contains(DELIMITER) {
        return fail(format!("must not contain `{DELIMITER}`"));
    }
    if name.chars().any(char::is_control) {
        return fail("must not contain control characters".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let fail = |reason: String| Err(ValidationError::new(Field::Email, reason));
    if email.chars().count() > EMAIL_MAX {
        return fail(format!("must be at most {EMAIL_MAX} characters"));
    }
    if email.contains(DELIMITER) {
        return fail(format!("must not contain `{DELIMITER}`"));
    }
    if email.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return fail("must not contain whitespace".to_string());
    }
    let Some((local, domain)) = email.split_once('@') else {
        return fail("must contain `@`".to_string());
    };
    if local.is_empty() {
        return fail("is missing the part before `@`".to_string());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return fail("needs a domain with a `.` after `@`".to_string());
    }
    Ok(())
}

/// Key paths are free-form; existence is checked when the profile is applied.
pub fn validate_ssh_key_path(path: &str) -> Result<(), ValidationError> {
    if path.chars().any(char::is_control) {
        return Err(ValidationError::new(
            Field::SshKeyPath,
            "must not contain control characters",
        ));
    }
    Ok(())
}

pub fn validate_host(host: &str) -> Result<(), ValidationError> {
    let fail = |reason: &str| Err(ValidationError::new(Field::Host, reason));
    if host.is_empty() {
        return fail("must not be empty");
    }
    if host.len() > HOST_MAX {
        return fail("must be at most 253 characters");
    }
    if host.contains("://") {
        return fail("must not include a protocol prefix");
    }
    if host.contains(':') {
        return fail("must not include a port");
    }
    if host.contains('/') {
        return fail("must be a bare host name without a path");
    }
    if !host.contains('.') {
        return fail("must be a fully-qualified domain (at least one `.`)");
    }
    for label in host.split('.') {
        if label.is_empty() {
            return fail("must not contain empty labels");
        }
        if !label.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
            return fail("labels may only contain ASCII letters, digits and hyphens");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return fail("labels must not start or end with a hyphen");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_grammar_follows_github_handles() {
        let longest = "x".repeat(39);
        let too_long = "x".repeat(40);
        for ok in ["a", "alice", "alice-work", "A1-b2-c3", longest.as_str()] {
            assert!(validate_username(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["", "-alice", "alice-", "al--ice", "al_ice", "ali ce", too_long.as_str()] {
            let err = validate_username(bad).expect_err("should reject");
            assert_eq!(err.field, Field::Username, "{bad}");
        }
    }

    #[test]
    fn email_requires_at_and_dotted_domain() {
        assert!(validate_email("alice@x.com").is_ok());
        assert!(validate_email("a.b+tag@mail.example.org").is_ok());
        for bad in ["alice", "@x.com", "alice@localhost", "alice@x.", "a|b@x.com", "a b@x.com"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
        let long = format!("{}@x.com", "a".repeat(250));
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn display_name_rejects_delimiter_and_allows_unicode() {
        assert!(validate_display_name("Zoë Ångström").is_ok());
        let err = validate_display_name("Alice | Work").expect_err("delimiter");
        assert_eq!(err.field, Field::DisplayName);
        assert!(err.to_string().contains("display_name"));
        assert!(validate_display_name("  ").is_err());
        assert!(validate_display_name("line\nbreak").is_err());
    }

    #[test]
    fn host_must_be_a_bare_domain() {
        assert!(validate_host("github.com").is_ok());
        assert!(validate_host("git.corp.example.io").is_ok());
        for bad in [
            "",
            "localhost",
            "https://github.com",
            "github.com:22",
            "github.com/org",
            "git..hub.com",
            "-github.com",
        ] {
            assert!(validate_host(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn ssh_key_path_is_free_form_but_single_line() {
        assert!(validate_ssh_key_path("~/.ssh/id with spaces|pipe").is_ok());
        assert!(validate_ssh_key_path("a\nb").is_err());
    }

    #[test]
    fn builder_drops_empty_ssh_key() {
        let profile = Profile::new("alice", "Alice", "alice@x.com").with_ssh_key("");
        assert_eq!(profile.ssh_key_path, None);
        assert_eq!(profile.host, DEFAULT_HOST);
        assert!(profile.is_current());
        assert!(profile.validate().is_ok());
    }
}
