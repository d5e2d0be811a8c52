//! Launch readiness of each configured server

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::schema::is_blank_env_value;
use super::timestamp;
use crate::config::SERVERS_KEY;
use crate::error::Result;
use crate::manifest;
use crate::probe::{HostProbe, ProbePool};

/// Launchers that fetch and run a package on demand
const LAUNCHERS: [&str; 2] = ["npx", "uvx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Ready,
    AssumedOk,
    Failed,
    Unknown,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub status: ServerState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub args: Vec<String>,
    pub issues: Vec<String>,
}

impl StatusResult {
    fn new(command: Option<&str>, args: Vec<String>) -> Self {
        Self {
            status: ServerState::Unknown,
            message: String::new(),
            command: command.map(|c| c.to_string()),
            args,
            issues: Vec::new(),
        }
    }

    fn set(&mut self, status: ServerState, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub running: usize,
    pub failed: usize,
    pub unknown: usize,
}

/// Result of `check_server_status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub timestamp: String,
    pub servers: BTreeMap<String, StatusResult>,
    pub summary: StatusSummary,
}

/// Load the manifest and check every server (or only `only`)
pub async fn check_manifest_servers(
    path: &Path,
    only: Option<&str>,
    probe: Arc<dyn HostProbe>,
    pool: &ProbePool,
) -> Result<StatusReport> {
    let text = manifest::load_manifest_text(path)?;
    let value = manifest::parse_manifest(&text)?;
    let servers = match value.get(SERVERS_KEY) {
        Some(Value::Object(servers)) => servers.clone(),
        _ => Map::new(),
    };
    Ok(check_servers(&servers, only, probe, pool).await)
}

/// Check server entries concurrently; a probe that times out is `error`
pub async fn check_servers(
    servers: &Map<String, Value>,
    only: Option<&str>,
    probe: Arc<dyn HostProbe>,
    pool: &ProbePool,
) -> StatusReport {
    let selected: Vec<(String, Value)> = servers
        .iter()
        .filter(|(name, _)| only.map_or(true, |wanted| wanted == name.as_str()))
        .map(|(name, entry)| (name.clone(), entry.clone()))
        .collect();

    let mut handles = Vec::with_capacity(selected.len());
    for (name, entry) in &selected {
        let probe = Arc::clone(&probe);
        let pool = pool.clone();
        let entry = entry.clone();
        let label = format!("server {}", name);
        handles.push(tokio::spawn(async move {
            pool.run(label, move || check_entry(&entry, probe.as_ref()))
                .await
        }));
    }

    let mut report = StatusReport {
        timestamp: timestamp(),
        servers: BTreeMap::new(),
        summary: StatusSummary::default(),
    };

    for ((name, entry), handle) in selected.into_iter().zip(handles) {
        let outcome = match handle.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let result = outcome.unwrap_or_else(|reason| {
            debug!(server = %name, reason = %reason, "server check unavailable");
            let mut result = StatusResult::new(
                entry.get("command").and_then(Value::as_str),
                string_args(&entry),
            );
            result.set(ServerState::Error, format!("Error checking server: {}", reason));
            result
        });

        report.summary.total += 1;
        match result.status {
            ServerState::Ready | ServerState::AssumedOk => report.summary.running += 1,
            ServerState::Failed => report.summary.failed += 1,
            ServerState::Unknown | ServerState::Error => report.summary.unknown += 1,
        }
        report.servers.insert(name, result);
    }

    report
}

/// Check a single server entry
pub fn check_entry(entry: &Value, probe: &dyn HostProbe) -> StatusResult {
    let Some(fields) = entry.as_object() else {
        let mut result = StatusResult::new(None, Vec::new());
        result.set(ServerState::Error, "Server entry is not an object");
        return result;
    };

    let command = fields
        .get("command")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty());
    let args = string_args(entry);
    let mut result = StatusResult::new(command, args.clone());

    match command {
        None => {
            result.set(ServerState::Failed, "No command specified");
            result.issues.push("missing_command".to_string());
        }
        Some(command) => match launcher_of(command, &args) {
            Some(launcher) => match probe.resolve_command(launcher) {
                Ok(_) => result.set(
                    ServerState::AssumedOk,
                    "NPX/UVX command, likely will work if npm/uv is installed",
                ),
                Err(_) => {
                    result.set(ServerState::Failed, format!("{} not found in PATH", launcher));
                    result.issues.push("command_not_found".to_string());
                }
            },
            None => match probe.resolve_command(command) {
                Ok(_) if is_cmd_shell(command) => result.set(
                    ServerState::Unknown,
                    "Command shell wrapper; the nested command was not checked",
                ),
                Ok(_) => result.set(ServerState::Ready, format!("{} found in PATH", command)),
                Err(_) => {
                    result.set(ServerState::Failed, format!("{} not found in PATH", command));
                    result.issues.push("command_not_found".to_string());
                }
            },
        },
    }

    if let Some(Value::Object(env)) = fields.get("env") {
        for (key, value) in env {
            if is_blank_env_value(value) {
                result.issues.push(format!("empty_env_{}", key));
            }
        }
    }

    result
}

/// The on-demand launcher behind `command`, directly or through `cmd.exe /c`
fn launcher_of<'a>(command: &'a str, args: &'a [String]) -> Option<&'a str> {
    if let Some(launcher) = LAUNCHERS.iter().find(|l| **l == command) {
        return Some(*launcher);
    }
    if is_cmd_shell(command) && args.first().map_or(false, |a| a.eq_ignore_ascii_case("/c")) {
        let nested = args.get(1)?;
        let program = nested.split_whitespace().next()?;
        return LAUNCHERS
            .iter()
            .find(|l| program == **l || program.strip_prefix(**l) == Some(".cmd"))
            .copied();
    }
    None
}

fn is_cmd_shell(command: &str) -> bool {
    command.eq_ignore_ascii_case("cmd.exe") || command.eq_ignore_ascii_case("cmd")
}

fn string_args(entry: &Value) -> Vec<String> {
    entry
        .get("args")
        .and_then(Value::as_array)
        .map(|args| {
            args.iter()
                .filter_map(Value::as_str)
                .map(|a| a.to_string())
                .collect()
        })
        .unwrap_or_default()
}
