use atty::Stream;
use color_eyre::Result;
use persona_core::{CommandGroup, CommandInfo, CommandStatus, ExecutionOutcome};
use serde_json::Value;

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

pub fn emit_output(opts: &OutputOptions, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();
    let style = Style::new(opts.no_color, atty::is(Stream::Stdout));

    if opts.json {
        let payload = persona_core::to_json_response(info, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    if let CommandStatus::Ok = outcome.status {
        if opts.quiet {
            return Ok(code);
        }
        let message = persona_core::format_status_message(info, &outcome.message);
        println!("{}", style.status(&outcome.status, &message));
        if let Some(table) = render_table(&style, info, &outcome.details) {
            println!("{table}");
        }
        for warning in warnings_from_details(&outcome.details) {
            println!("{}", style.warning(&format!("warning: {warning}")));
        }
        if let Some(hint) = hint_from_details(&outcome.details) {
            println!("{}", style.info(&format!("Tip: {hint}")));
        }
    } else {
        let header = persona_core::format_status_message(info, &outcome.message);
        println!("{}", style.error_header(&outcome.status, &header));
        let why = collect_why_bullets(&outcome.details);
        if !why.is_empty() {
            println!();
            println!("Why:");
            for reason in why {
                println!("  • {reason}");
            }
        }
        let fixes = collect_fix_bullets(&outcome.details);
        if !fixes.is_empty() {
            println!();
            println!("Fix:");
            for fix in fixes {
                println!("{}", style.fix_bullet(&format!("  • {fix}")));
            }
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn warnings_from_details(details: &Value) -> Vec<&str> {
    details
        .get("warnings")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn collect_why_bullets(details: &Value) -> Vec<String> {
    let mut bullets = Vec::new();
    if let Some(reason) = details.get("reason").and_then(Value::as_str) {
        if let Some(text) = reason_display(reason) {
            push_unique(&mut bullets, text);
        }
    }
    if let Some(cause) = details.get("cause").and_then(Value::as_str) {
        push_unique(&mut bullets, cause);
    }
    if let Some(issues) = details.get("issues").and_then(Value::as_array) {
        for issue in issues.iter().filter_map(Value::as_str) {
            push_unique(&mut bullets, issue);
        }
    }
    bullets
}

fn collect_fix_bullets(details: &Value) -> Vec<String> {
    let mut fixes = Vec::new();
    if let Some(hint) = hint_from_details(details) {
        push_unique(&mut fixes, hint);
    }
    if fixes.is_empty() {
        fixes.push("Re-run with --help for usage.".to_string());
    }
    fixes
}

fn push_unique(vec: &mut Vec<String>, text: impl Into<String>) {
    let entry = text.into();
    if entry.trim().is_empty() {
        return;
    }
    if !vec.iter().any(|existing| existing == &entry) {
        vec.push(entry);
    }
}

fn reason_display(code: &str) -> Option<&'static str> {
    match code {
        "identity_mismatch" => Some("The GitHub CLI is logged in as a different account."),
        "not_a_repository" => Some("The working directory is not inside a git repository."),
        "lock_timeout" => Some("Another persona process is holding the data directory lock."),
        "newer_format" => Some("The record was written by a newer persona."),
        "not_applied" => Some("git reports a different value than the one written."),
        "ssh_key_permissions" => Some("ssh refuses keys readable by other users."),
        _ => None,
    }
}

fn render_table(style: &Style, info: CommandInfo, details: &Value) -> Option<String> {
    match info.group {
        CommandGroup::List => {
            let rows = details
                .get("profiles")?
                .as_array()?
                .iter()
                .map(|profile| {
                    let active = profile.get("active").and_then(Value::as_bool) == Some(true);
                    vec![
                        if active { "*" } else { "" }.to_string(),
                        field(profile, "username"),
                        field(profile, "name"),
                        field(profile, "email"),
                        field(profile, "host"),
                    ]
                })
                .collect::<Vec<_>>();
            format_table(style, &["", "Username", "Name", "Email", "Host"], &rows)
        }
        CommandGroup::Links => {
            let mut rows: Vec<Vec<String>> = details
                .get("links")?
                .as_array()?
                .iter()
                .map(|link| {
                    vec![
                        field(link, "path_prefix"),
                        field(link, "username"),
                        field(link, "mode"),
                    ]
                })
                .collect();
            if let Some(legacy) = details.get("legacy").and_then(Value::as_array) {
                rows.extend(legacy.iter().map(|entry| {
                    vec![
                        format!("*/{}", field(entry, "basename")),
                        field(entry, "username"),
                        "legacy".to_string(),
                    ]
                }));
            }
            format_table(style, &["Path", "Username", "Mode"], &rows)
        }
        _ => None,
    }
}

fn field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn format_table(style: &Style, headers: &[&str], rows: &[Vec<String>]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let mut lines = vec![style.table_header(&render_row(headers.iter().copied(), &widths))];
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str), &widths));
    }
    Some(lines.join("\n"))
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fix_bullets_fall_back_to_usage_help() {
        assert_eq!(
            collect_fix_bullets(&json!({})),
            vec!["Re-run with --help for usage.".to_string()]
        );
        assert_eq!(
            collect_fix_bullets(&json!({ "hint": "unlink first" })),
            vec!["unlink first".to_string()]
        );
    }

    #[test]
    fn why_bullets_use_reason_display_and_dedupe() {
        let details = json!({
            "reason": "lock_timeout",
            "cause": "held by pid 42",
            "issues": ["held by pid 42", "second"],
        });
        let why = collect_why_bullets(&details);
        assert_eq!(why.len(), 3);
        assert!(why[0].contains("lock"));
    }

    #[test]
    fn links_table_includes_legacy_rows() {
        let style = Style::new(true, false);
        let details = json!({
            "links": [{ "path_prefix": "/home/u/work", "username": "work-acct", "mode": "always" }],
            "legacy": [{ "basename": "blog", "username": "me" }],
        });
        let info = CommandInfo::new(CommandGroup::Links, "links");
        let table = render_table(&style, info, &details).expect("table");
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Path"));
        assert!(lines[2].contains("work-acct"));
        assert!(lines[3].starts_with("*/blog"));
    }
}
