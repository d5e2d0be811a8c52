//! Per-entry validation of `mcpServers`

use serde_json::{Map, Value};
use tracing::debug;

use super::{Issue, IssueType};
use crate::config::ValidatorSettings;
use crate::error::{MendError, Result};
use crate::probe::HostProbe;

/// Validate every server entry in manifest order.
///
/// Each entry is checked on its own; a malformed entry becomes an
/// `invalid_entry` issue and the remaining entries are still checked.
pub fn validate_servers(
    servers: &Map<String, Value>,
    settings: &ValidatorSettings,
    probe: &dyn HostProbe,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    for (name, entry) in servers {
        match validate_entry(name, entry, settings, probe) {
            Ok(found) => issues.extend(found),
            Err(MendError::SchemaViolation { server, message }) => {
                issues.push(
                    Issue::critical(
                        IssueType::InvalidEntry,
                        &format!("Server \"{}\" {}", server, message),
                        "Each server entry must be an object with a command field",
                    )
                    .for_server(&server),
                );
            }
            Err(e) => {
                issues.push(
                    Issue::critical(
                        IssueType::InvalidEntry,
                        &e.to_string(),
                        "Each server entry must be an object with a command field",
                    )
                    .for_server(name),
                );
            }
        }
    }

    issues
}

/// Validate a single server entry
pub fn validate_entry(
    name: &str,
    entry: &Value,
    settings: &ValidatorSettings,
    probe: &dyn HostProbe,
) -> Result<Vec<Issue>> {
    let entry = entry.as_object().ok_or_else(|| MendError::SchemaViolation {
        server: name.to_string(),
        message: format!("is {} instead of an object", json_kind(entry)),
    })?;

    let mut issues = Vec::new();

    let command = match entry.get("command").and_then(Value::as_str) {
        Some(command) if !command.trim().is_empty() => command,
        _ => {
            issues.push(
                Issue::critical(
                    IssueType::MissingCommand,
                    &format!("Server \"{}\" missing \"command\" field", name),
                    "Add a valid command field pointing to the executable",
                )
                .for_server(name),
            );
            return Ok(issues);
        }
    };

    if !is_known_interpreter(command, settings) {
        if let Err(e) = probe.resolve_command(command) {
            debug!(server = name, command, error = %e, "command did not resolve");
            issues.push(
                Issue::high(
                    IssueType::CommandNotFound,
                    &format!("Command \"{}\" not found in PATH", command),
                    &format!("Install {} or update the command path", command),
                )
                .for_server(name),
            );
        }
    }

    if let Some(Value::Array(args)) = entry.get("args") {
        for arg in args.iter().filter_map(Value::as_str) {
            if has_single_backslash_only(arg) {
                issues.push(
                    Issue::medium(
                        IssueType::PathEscaping,
                        &format!("Potential path escaping issue in argument: \"{}\"", arg),
                        "Ensure Windows paths use double backslashes (\\\\) in JSON",
                    )
                    .for_server(name),
                );
            }
        }
    }

    if let Some(Value::Object(env)) = entry.get("env") {
        for (key, value) in env {
            if is_blank_env_value(value) {
                issues.push(
                    Issue::medium(
                        IssueType::EmptyEnvVar,
                        &format!("Environment variable \"{}\" is empty", key),
                        "Set the required environment variable value",
                    )
                    .for_server(name),
                );
            }
        }
    }

    Ok(issues)
}

fn is_known_interpreter(command: &str, settings: &ValidatorSettings) -> bool {
    settings.known_interpreters.iter().any(|known| known == command)
}

/// An argument with a backslash but no doubled backslash anywhere
fn has_single_backslash_only(arg: &str) -> bool {
    arg.contains('\\') && !arg.contains("\\\\")
}

/// Null, empty and whitespace-only values all count as unset
pub(crate) fn is_blank_env_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
