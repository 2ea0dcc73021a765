//! Presentation helpers shared by every command: group names and the JSON envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::CommandInfo;
use crate::outcome::{CommandStatus, ExecutionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandGroup {
    Add,
    Edit,
    Remove,
    List,
    Switch,
    Link,
    Unlink,
    Links,
    Resolve,
    Auto,
    Status,
    Test,
    Guard,
    Migrate,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::Add => "add",
            CommandGroup::Edit => "edit",
            CommandGroup::Remove => "remove",
            CommandGroup::List => "list",
            CommandGroup::Switch => "switch",
            CommandGroup::Link => "link",
            CommandGroup::Unlink => "unlink",
            CommandGroup::Links => "links",
            CommandGroup::Resolve => "resolve",
            CommandGroup::Auto => "auto",
            CommandGroup::Status => "status",
            CommandGroup::Test => "test",
            CommandGroup::Guard => "guard",
            CommandGroup::Migrate => "migrate",
        };
        f.write_str(name)
    }
}

#[must_use]
pub fn to_json_response(info: CommandInfo, outcome: &ExecutionOutcome) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(info, &outcome.message),
        "details": details,
    })
}

#[must_use]
pub fn format_status_message(info: CommandInfo, message: &str) -> String {
    let group_name = info.group.to_string();
    let prefix = if group_name == info.name {
        format!("persona {}", info.name)
    } else {
        format!("persona {} {}", group_name, info.name)
    };
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}
