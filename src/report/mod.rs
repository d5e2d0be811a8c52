//! Full health report.
//!
//! Every subsystem runs as its own task. A subsystem that fails or times out
//! becomes an unavailable [`Section`] and contributes nothing to the summary.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::checks::dependencies::{probe_dependencies, DependencyReport};
use crate::checks::ports::{probe_ports, PortReport};
use crate::checks::servers::{check_manifest_servers, StatusReport};
use crate::checks::{self, platform, timestamp, DiagnosticReport, Issue};
use crate::config::MendConfig;
use crate::error::{MendError, Result};
use crate::fixes::IssueCategory;
use crate::logs::{analyze_logs, LogAnalysis};
use crate::probe::{HostProbe, ProbePool};

pub const INSTALL_MISSING_DEPENDENCIES: &str = "Install missing critical dependencies";
pub const FIX_FAILED_SERVERS: &str = "Fix failed MCP servers";

/// One subsystem's contribution to the report
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    Ready(T),
    Unavailable { reason: String },
}

impl<T> Section<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Section::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Section::Unavailable { .. })
    }
}

impl<T: Serialize> Serialize for Section<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Section::Ready(value) => value.serialize(serializer),
            Section::Unavailable { reason } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("unavailable", &true)?;
                map.serialize_entry("reason", reason)?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    MinorIssues,
    NeedsAttention,
}

impl OverallStatus {
    pub fn from_critical_count(count: usize) -> Self {
        match count {
            0 => OverallStatus::Healthy,
            1..=2 => OverallStatus::MinorIssues,
            _ => OverallStatus::NeedsAttention,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub overall_status: OverallStatus,
    pub critical_issues: usize,
    pub warnings: usize,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub unavailable: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSections {
    pub configuration: Section<DiagnosticReport>,
    pub dependencies: Section<DependencyReport>,
    pub server_status: Section<StatusReport>,
    pub port_conflicts: Section<PortReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_analysis: Option<Section<LogAnalysis>>,
}

/// Result of `full_report`
#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub timestamp: String,
    pub platform: String,
    pub sections: ReportSections,
    pub summary: HealthSummary,
}

/// Run every subsystem concurrently and aggregate the results
pub async fn full_report(
    manifest_path: &Path,
    include_logs: bool,
    config: &MendConfig,
    probe: Arc<dyn HostProbe>,
) -> FullReport {
    let pool = ProbePool::from_settings(&config.probes);

    let configuration = {
        let pool = pool.clone();
        let path = manifest_path.to_path_buf();
        let config = config.clone();
        let probe = Arc::clone(&probe);
        tokio::spawn(async move {
            pool.run("configuration", move || {
                checks::diagnose(&path, &config, probe.as_ref())
            })
            .await
        })
    };

    let dependencies = {
        let pool = pool.clone();
        let specs = config.probes.dependencies.clone();
        let probe = Arc::clone(&probe);
        tokio::spawn(async move {
            Ok::<_, MendError>(probe_dependencies(&specs, probe, &pool).await)
        })
    };

    let server_status = {
        let pool = pool.clone();
        let path = manifest_path.to_path_buf();
        let probe = Arc::clone(&probe);
        tokio::spawn(async move { check_manifest_servers(&path, None, probe, &pool).await })
    };

    let port_conflicts = {
        let pool = pool.clone();
        let ports = config.probes.ports.clone();
        let probe = Arc::clone(&probe);
        tokio::spawn(async move {
            Ok::<_, MendError>(probe_ports(&ports, probe, &pool).await)
        })
    };

    let log_analysis = include_logs.then(|| {
        let pool = pool.clone();
        let dir = config.log_dir();
        let settings = config.logs.clone();
        tokio::spawn(async move {
            pool.run("log analysis", move || analyze_logs(&dir, &settings))
                .await
        })
    });

    // Awaited in a fixed order so the report is deterministic
    let sections = ReportSections {
        configuration: section("configuration", configuration.await),
        dependencies: section("dependencies", dependencies.await),
        server_status: section("serverStatus", server_status.await),
        port_conflicts: section("portConflicts", port_conflicts.await),
        log_analysis: match log_analysis {
            Some(handle) => Some(section("logAnalysis", handle.await)),
            None => None,
        },
    };

    let summary = summarize(&sections);
    FullReport {
        timestamp: timestamp(),
        platform: platform().to_string(),
        sections,
        summary,
    }
}

fn section<T>(name: &str, joined: std::result::Result<Result<T>, JoinError>) -> Section<T> {
    match joined {
        Ok(Ok(value)) => Section::Ready(value),
        Ok(Err(e)) => {
            debug!(section = name, error = %e, "section unavailable");
            Section::unavailable(e.to_string())
        }
        Err(e) => {
            warn!(section = name, error = %e, "section task failed");
            Section::unavailable(format!("{} task failed: {}", name, e))
        }
    }
}

/// Roll the sections up into one health summary
pub fn summarize(sections: &ReportSections) -> HealthSummary {
    let mut critical = 0;
    let mut warnings = 0;
    let mut next_steps: Vec<String> = Vec::new();
    let mut unavailable = Vec::new();

    if let Some(config) = sections.configuration.ready() {
        critical += config.critical_count();
        warnings += config.warning_count();
        next_steps.extend(ranked_fixes(&config.issues));
    } else {
        unavailable.push("configuration".to_string());
    }

    let missing_dependencies = match sections.dependencies.ready() {
        Some(deps) => deps.summary.missing_critical.len(),
        None => {
            unavailable.push("dependencies".to_string());
            0
        }
    };
    critical += missing_dependencies;

    let failed_servers = match sections.server_status.ready() {
        Some(status) => status.summary.failed,
        None => {
            unavailable.push("serverStatus".to_string());
            0
        }
    };
    critical += failed_servers;

    if sections.port_conflicts.is_unavailable() {
        unavailable.push("portConflicts".to_string());
    }
    if let Some(Section::Unavailable { .. }) = sections.log_analysis {
        unavailable.push("logAnalysis".to_string());
    }

    if missing_dependencies > 0 {
        next_steps.push(INSTALL_MISSING_DEPENDENCIES.to_string());
    }
    if failed_servers > 0 {
        next_steps.push(FIX_FAILED_SERVERS.to_string());
    }

    HealthSummary {
        overall_status: OverallStatus::from_critical_count(critical),
        critical_issues: critical,
        warnings,
        recommendations: recommendations(sections, critical, warnings),
        next_steps,
        unavailable,
    }
}

/// Fix text of critical and high issues, most severe first, without repeats
fn ranked_fixes(issues: &[Issue]) -> Vec<String> {
    let mut serious: Vec<&Issue> = issues.iter().filter(|i| i.severity.is_critical()).collect();
    serious.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut fixes: Vec<String> = Vec::new();
    for issue in serious {
        if !fixes.contains(&issue.fix) {
            fixes.push(issue.fix.clone());
        }
    }
    fixes
}

fn recommendations(sections: &ReportSections, critical: usize, warnings: usize) -> Vec<String> {
    let mut out = Vec::new();

    if critical > 0 {
        out.push("Address critical issues first".to_string());
        out.push("Use the suggest_fixes tool for specific guidance".to_string());
    }

    if let Some(config) = sections.configuration.ready() {
        if config.server_count > 10 {
            out.push(
                "You have many MCP servers configured. Consider disabling unused ones to improve startup time"
                    .to_string(),
            );
        }
    }

    if critical == 0 && warnings > 3 {
        out.push("Review warnings to prevent future issues".to_string());
    }

    if let Some(ports) = sections.port_conflicts.ready() {
        if !ports.conflicts.is_empty() {
            let list: Vec<String> = ports.conflicts.iter().map(|p| p.to_string()).collect();
            out.push(format!(
                "Ports {} are in use; reconfigure the affected servers or stop the conflicting processes",
                list.join(", ")
            ));
        }
    }

    if let Some(logs) = sections.log_analysis.as_ref().and_then(Section::ready) {
        let buckets = [
            (logs.patterns.connection_issues, "connection", IssueCategory::ServerCrash),
            (logs.patterns.config_errors, "configuration", IssueCategory::ConfigSyntax),
            (logs.patterns.dependency_issues, "missing dependency", IssueCategory::DependencyMissing),
            (logs.patterns.permission_errors, "permission", IssueCategory::PermissionError),
            (logs.patterns.port_conflicts, "port", IssueCategory::PortConflict),
        ];
        for (count, label, category) in buckets {
            if count > 0 {
                out.push(format!(
                    "Logs show {} {} error(s); see suggest_fixes with issueType \"{}\"",
                    count, label, category
                ));
            }
        }
    }

    out
}
