//! Report tests for mcpmend
//!
//! Tests for the environment probes, log mining and the aggregated report.

mod common;

use std::fs;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::{test_config, write_manifest, StubProbe};
use mcpmend::checks::ports::probe_ports;
use mcpmend::checks::ProbeStatus;
use mcpmend::config::LogSettings;
use mcpmend::probe::{HostProbe, ProbePool, SystemProbe};
use mcpmend::report::{full_report, OverallStatus, Section, INSTALL_MISSING_DEPENDENCIES};
use mcpmend::{analyze_logs, utils::block_on};

const ALL_RUNTIMES: [&str; 6] = ["node", "npm", "npx", "python", "uv", "weatherd"];

/// A port nothing is listening on right now
fn free_port() -> u16 {
    let listener = TcpListener::bind(("0.0.0.0", 0)).expect("Failed to bind ephemeral port");
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Port Probe
// ============================================================================

#[test]
fn test_unbound_ports_are_available() {
    let ports = vec![free_port(), free_port()];
    let probe: Arc<dyn HostProbe> = Arc::new(SystemProbe::new(Duration::from_secs(2)));
    let pool = ProbePool::new(4, Duration::from_secs(5));

    let report = block_on(probe_ports(&ports, probe, &pool)).unwrap();

    assert!(report.conflicts.is_empty());
    assert!(report.recommendations.is_empty());
    for port in &ports {
        assert_eq!(report.ports[port].status, ProbeStatus::Available);
    }
}

#[test]
fn test_busy_port_is_a_conflict() {
    let probe = StubProbe::default().with_busy_port(8080).shared();
    let pool = ProbePool::new(4, Duration::from_secs(2));

    let report = block_on(probe_ports(&[7777, 8080, 8080], probe, &pool)).unwrap();

    assert_eq!(report.ports.len(), 2);
    assert_eq!(report.conflicts, vec![8080]);
    assert_eq!(report.ports[&8080].status, ProbeStatus::InUse);
    assert_eq!(report.ports[&8080].details.as_deref(), Some("node 4242"));
    assert_eq!(report.recommendations.len(), 2);
}

// ============================================================================
// Log Mining
// ============================================================================

#[test]
fn test_absent_log_directory() {
    let dir = TempDir::new().unwrap();
    let analysis = analyze_logs(&dir.path().join("logs"), &LogSettings::default());

    assert!(!analysis.logs_found);
    assert_eq!(analysis.patterns.total(), 0);
    assert!(analysis.recent_errors.is_empty());
    assert!(analysis.error.is_none());
}

#[test]
fn test_log_errors_are_classified() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir(&logs).unwrap();
    fs::write(
        logs.join("mcp-server-fs.log"),
        "info: starting\nError: EACCES permission denied\nERROR: Cannot find module 'x' (not found)\n",
    )
    .unwrap();
    fs::write(logs.join("unrelated.log"), "Error: connection refused\n").unwrap();

    let analysis = analyze_logs(&logs, &LogSettings::default());

    assert!(analysis.logs_found);
    assert_eq!(analysis.recent_errors.len(), 1);
    assert_eq!(analysis.recent_errors[0].file, "mcp-server-fs.log");
    assert_eq!(analysis.recent_errors[0].errors.len(), 2);
    assert_eq!(analysis.patterns.permission_errors, 1);
    assert_eq!(analysis.patterns.dependency_issues, 1);
    assert_eq!(analysis.patterns.connection_issues, 0);
}

// ============================================================================
// Aggregated Report
// ============================================================================

#[test]
fn test_healthy_report() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{"command":"node"}}}"#);
    let config = test_config(&dir);
    let probe = StubProbe::with_commands(&ALL_RUNTIMES).shared();

    let report = block_on(full_report(&path, true, &config, probe)).unwrap();

    assert_eq!(report.summary.overall_status, OverallStatus::Healthy);
    assert_eq!(report.summary.critical_issues, 0);
    assert!(report.summary.unavailable.is_empty());
    assert!(report.summary.next_steps.is_empty());

    let logs = report
        .sections
        .log_analysis
        .as_ref()
        .and_then(Section::ready)
        .expect("log analysis requested");
    assert!(!logs.logs_found);
}

#[test]
fn test_log_analysis_can_be_skipped() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{}}"#);
    let probe = StubProbe::with_commands(&ALL_RUNTIMES).shared();

    let report = block_on(full_report(&path, false, &test_config(&dir), probe)).unwrap();

    assert!(report.sections.log_analysis.is_none());
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["sections"].get("logAnalysis").is_none());
}

#[test]
fn test_critical_count_adds_up_subsystems() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(
        &dir,
        r#"{"mcpServers":{"a":{},"b":{"command":"weatherd"}}}"#,
    );
    // Only the optional runtimes are present
    let probe = StubProbe::with_commands(&["python", "uv"]).shared();

    let report = block_on(full_report(&path, false, &test_config(&dir), probe)).unwrap();

    let config = report.sections.configuration.ready().unwrap();
    let deps = report.sections.dependencies.ready().unwrap();
    let servers = report.sections.server_status.ready().unwrap();

    // missing_command + command_not_found
    assert_eq!(config.critical_count(), 2);
    assert_eq!(deps.summary.missing_critical.len(), 3);
    assert_eq!(servers.summary.failed, 2);

    assert_eq!(report.summary.critical_issues, 7);
    assert_eq!(report.summary.overall_status, OverallStatus::NeedsAttention);
    assert!(report
        .summary
        .next_steps
        .contains(&INSTALL_MISSING_DEPENDENCIES.to_string()));
}

#[test]
fn test_missing_manifest_marks_server_status_unavailable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let probe = StubProbe::with_commands(&ALL_RUNTIMES).shared();

    let report = block_on(full_report(&path, false, &test_config(&dir), probe)).unwrap();

    assert!(report.sections.server_status.is_unavailable());
    assert_eq!(report.summary.unavailable, vec!["serverStatus".to_string()]);
    // config_missing is the only critical issue
    assert_eq!(report.summary.critical_issues, 1);
    assert_eq!(report.summary.overall_status, OverallStatus::MinorIssues);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sections"]["serverStatus"]["unavailable"], true);
    assert!(json["sections"]["serverStatus"]["reason"].is_string());
}
