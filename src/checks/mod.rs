//! Manifest diagnosis and environment checks.
//!
//! `diagnose` is synchronous; the probe families in `dependencies`, `ports`
//! and `servers` run through a [`crate::probe::ProbePool`].

pub mod dependencies;
pub mod ports;
pub mod schema;
pub mod servers;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::config::{MendConfig, SERVERS_KEY};
use crate::error::MendError;
use crate::manifest;
use crate::probe::HostProbe;

/// Issue severity, ordered so that `Critical` is the greatest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Critical and high issues count toward the critical total
    pub fn is_critical(self) -> bool {
        self >= Severity::High
    }

    pub fn is_warning(self) -> bool {
        !self.is_critical()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    ConfigMissing,
    ConfigUnreadable,
    JsonSyntaxError,
    MissingMcpServers,
    InvalidEntry,
    MissingCommand,
    CommandNotFound,
    PathEscaping,
    EmptyEnvVar,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::ConfigMissing => "config_missing",
            IssueType::ConfigUnreadable => "config_unreadable",
            IssueType::JsonSyntaxError => "json_syntax_error",
            IssueType::MissingMcpServers => "missing_mcp_servers",
            IssueType::InvalidEntry => "invalid_entry",
            IssueType::MissingCommand => "missing_command",
            IssueType::CommandNotFound => "command_not_found",
            IssueType::PathEscaping => "path_escaping",
            IssueType::EmptyEnvVar => "empty_env_var",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase())).ok()
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub fix: String,
}

impl Issue {
    pub fn new(issue_type: IssueType, severity: Severity, message: &str, fix: &str) -> Self {
        Self {
            issue_type,
            severity,
            message: message.to_string(),
            server: None,
            location: None,
            fix: fix.to_string(),
        }
    }

    pub fn critical(issue_type: IssueType, message: &str, fix: &str) -> Self {
        Self::new(issue_type, Severity::Critical, message, fix)
    }

    pub fn high(issue_type: IssueType, message: &str, fix: &str) -> Self {
        Self::new(issue_type, Severity::High, message, fix)
    }

    pub fn medium(issue_type: IssueType, message: &str, fix: &str) -> Self {
        Self::new(issue_type, Severity::Medium, message, fix)
    }

    pub fn for_server(mut self, server: &str) -> Self {
        self.server = Some(server.to_string());
        self
    }

    pub fn at(mut self, location: &Path) -> Self {
        self.location = Some(location.display().to_string());
        self
    }
}

/// Outcome of a single environment probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Installed,
    Missing,
    InUse,
    Available,
}

/// RFC 3339 timestamp stamped on every probe result
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn platform() -> &'static str {
    std::env::consts::OS
}

/// Result of `diagnose_config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub config_path: String,
    pub exists: bool,
    pub valid: bool,
    pub server_count: usize,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
}

impl DiagnosticReport {
    fn new(config_path: &Path) -> Self {
        Self {
            config_path: config_path.display().to_string(),
            ..Self::default()
        }
    }

    pub fn critical_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity.is_critical()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity.is_warning()).count()
    }
}

/// Analyze the manifest at `path`.
///
/// Never fails: a missing, unreadable or unparsable manifest becomes a
/// critical issue in the returned report.
pub fn diagnose(path: &Path, config: &MendConfig, probe: &dyn HostProbe) -> DiagnosticReport {
    let mut report = DiagnosticReport::new(path);

    let content = match manifest::load_manifest_text(path) {
        Ok(content) => content,
        Err(MendError::ConfigMissing(_)) => {
            report.issues.push(
                Issue::critical(
                    IssueType::ConfigMissing,
                    "MCP manifest file not found",
                    "Create the manifest with proper MCP server definitions",
                )
                .at(path),
            );
            return finish(report, config);
        }
        Err(e) => {
            report.exists = true;
            report.issues.push(
                Issue::critical(
                    IssueType::ConfigUnreadable,
                    &format!("Cannot read manifest: {}", e),
                    "Check file permissions on the manifest",
                )
                .at(path),
            );
            return finish(report, config);
        }
    };

    report.exists = true;

    let manifest = match manifest::parse_manifest(&content) {
        Ok(value) => value,
        Err(e) => {
            report.issues.push(
                Issue::critical(
                    IssueType::JsonSyntaxError,
                    &e.to_string(),
                    "Use the repair_syntax tool to attempt automatic repair",
                )
                .at(path),
            );
            return finish(report, config);
        }
    };

    report.valid = true;

    let servers = match manifest.get(SERVERS_KEY) {
        Some(serde_json::Value::Object(servers)) => servers,
        Some(_) => {
            report.issues.push(Issue::critical(
                IssueType::MissingMcpServers,
                &format!("\"{}\" must be an object mapping names to servers", SERVERS_KEY),
                &format!("Turn {} into an object of server entries", SERVERS_KEY),
            ));
            return finish(report, config);
        }
        None => {
            report.issues.push(Issue::critical(
                IssueType::MissingMcpServers,
                &format!("Missing \"{}\" object in manifest", SERVERS_KEY),
                &format!("Add an {} object to the manifest", SERVERS_KEY),
            ));
            return finish(report, config);
        }
    };

    report.server_count = servers.len();
    debug!(servers = servers.len(), path = %path.display(), "validating manifest entries");

    report
        .issues
        .extend(schema::validate_servers(servers, &config.validator, probe));

    let mut report = finish(report, config);
    add_recommendations(&mut report);
    report
}

fn finish(mut report: DiagnosticReport, config: &MendConfig) -> DiagnosticReport {
    report.issues = apply_config_to_issues(std::mem::take(&mut report.issues), config);
    report
}

/// Apply settings to issues
/// - Drops disabled issue types
/// - Applies severity overrides
pub fn apply_config_to_issues(issues: Vec<Issue>, config: &MendConfig) -> Vec<Issue> {
    issues
        .into_iter()
        .filter(|i| !config.is_issue_disabled(i.issue_type))
        .map(|mut i| {
            if let Some(severity) = config.get_severity_override(i.issue_type) {
                i.severity = severity;
            }
            i
        })
        .collect()
}

fn add_recommendations(report: &mut DiagnosticReport) {
    if report.server_count == 0 {
        report.recommendations.push(
            "Consider adding some useful MCP servers like filesystem, brave-search, or memory"
                .to_string(),
        );
    }

    if report.server_count > 10 {
        report.recommendations.push(
            "You have many MCP servers configured. Consider disabling unused ones to improve startup time"
                .to_string(),
        );
    }

    if report.critical_count() > 0 {
        report.recommendations.push(
            "Address critical and high-severity issues first before adding new MCP servers"
                .to_string(),
        );
    }
}
