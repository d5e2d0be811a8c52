//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use mcpmend::config::MendConfig;
use mcpmend::probe::{HostProbe, PortState};
use mcpmend::MendError;
use tempfile::TempDir;

/// Host probe answering from fixed lists instead of the real machine
#[derive(Debug, Default, Clone)]
pub struct StubProbe {
    pub commands: HashSet<String>,
    pub busy_ports: HashSet<u16>,
}

impl StubProbe {
    pub fn with_commands(commands: &[&str]) -> Self {
        Self {
            commands: commands.iter().map(|c| c.to_string()).collect(),
            busy_ports: HashSet::new(),
        }
    }

    pub fn with_busy_port(mut self, port: u16) -> Self {
        self.busy_ports.insert(port);
        self
    }

    pub fn shared(self) -> Arc<dyn HostProbe> {
        Arc::new(self)
    }
}

impl HostProbe for StubProbe {
    fn resolve_command(&self, command: &str) -> mcpmend::Result<PathBuf> {
        if self.commands.contains(command) {
            Ok(PathBuf::from("/usr/bin").join(command))
        } else {
            Err(MendError::probe_unavailable(command, "not on PATH"))
        }
    }

    fn command_version(&self, command: &str) -> mcpmend::Result<String> {
        if self.commands.contains(command) {
            Ok("v20.11.0".to_string())
        } else {
            Err(MendError::probe_unavailable(command, "not on PATH"))
        }
    }

    fn port_status(&self, port: u16) -> mcpmend::Result<PortState> {
        if self.busy_ports.contains(&port) {
            Ok(PortState::InUse {
                owner: Some("node 4242".to_string()),
            })
        } else {
            Ok(PortState::Available)
        }
    }
}

/// Write `content` as the manifest inside `dir`
pub fn write_manifest(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("claude_desktop_config.json");
    fs::write(&path, content).expect("Failed to write manifest");
    path
}

/// Settings with fast probes, a fixed port list and logs under `dir`
pub fn test_config(dir: &TempDir) -> MendConfig {
    let mut config = MendConfig::default();
    config.probes.timeout_seconds = 2;
    config.probes.ports = vec![7777, 8080];
    config.logs.dir = Some(dir.path().join("logs"));
    config
}

/// Every file in `dir` whose name contains `.backup.`
pub fn backups_in(dir: &TempDir) -> Vec<PathBuf> {
    fs::read_dir(dir.path())
        .expect("Failed to list directory")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.contains(".backup."))
        })
        .collect()
}
