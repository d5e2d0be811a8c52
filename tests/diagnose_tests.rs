//! Diagnosis tests for mcpmend
//!
//! Tests for manifest loading and server entry validation.

mod common;

use tempfile::TempDir;

use common::{test_config, write_manifest, StubProbe};
use mcpmend::checks::{diagnose, IssueType, Severity};

fn issue_types(report: &mcpmend::DiagnosticReport) -> Vec<IssueType> {
    report.issues.iter().map(|i| i.issue_type).collect()
}

// ============================================================================
// Manifest Loading
// ============================================================================

#[test]
fn test_valid_single_server() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{"command":"node"}}}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert!(report.exists);
    assert!(report.valid);
    assert_eq!(report.server_count, 1);
    assert!(report.issues.is_empty());
}

#[test]
fn test_missing_manifest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert!(!report.exists);
    assert!(!report.valid);
    assert_eq!(issue_types(&report), vec![IssueType::ConfigMissing]);
    assert_eq!(report.issues[0].severity, Severity::Critical);
    assert_eq!(report.issues[0].location.as_deref(), path.to_str());
}

#[test]
fn test_syntax_error_points_at_repair() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{"command":"node"},}}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert!(report.exists);
    assert!(!report.valid);
    assert_eq!(issue_types(&report), vec![IssueType::JsonSyntaxError]);
    assert!(report.issues[0].fix.contains("repair_syntax"));
}

#[test]
fn test_missing_servers_object() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"globalShortcut":"Ctrl+Space"}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert!(report.valid);
    assert_eq!(report.server_count, 0);
    assert_eq!(issue_types(&report), vec![IssueType::MissingMcpServers]);
}

#[test]
fn test_empty_servers_recommends_adding_some() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{}}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert!(report.issues.is_empty());
    assert_eq!(report.recommendations.len(), 1);
    assert!(report.recommendations[0].contains("Consider adding"));
}

// ============================================================================
// Entry Validation
// ============================================================================

#[test]
fn test_entry_without_command() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{}}}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert_eq!(report.issues.len(), 1);
    let issue = &report.issues[0];
    assert_eq!(issue.issue_type, IssueType::MissingCommand);
    assert_eq!(issue.severity, Severity::Critical);
    assert_eq!(issue.server.as_deref(), Some("a"));
}

#[test]
fn test_unknown_command_is_high() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"weather":{"command":"weatherd"}}}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert_eq!(issue_types(&report), vec![IssueType::CommandNotFound]);
    assert_eq!(report.issues[0].severity, Severity::High);
    assert_eq!(report.critical_count(), 1);
}

#[test]
fn test_command_on_path_passes() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"weather":{"command":"weatherd"}}}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::with_commands(&["weatherd"]));

    assert!(report.issues.is_empty());
}

#[test]
fn test_every_problem_in_one_entry() {
    let dir = TempDir::new().unwrap();
    let manifest = r#"{
        "mcpServers": {
            "fs": {
                "command": "node",
                "args": ["C:/a\\b", "plain"],
                "env": { "TOKEN": "", "HOME": "/home/me" }
            }
        }
    }"#;
    let path = write_manifest(&dir, manifest);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert_eq!(
        issue_types(&report),
        vec![IssueType::PathEscaping, IssueType::EmptyEnvVar]
    );
    assert!(report.issues.iter().all(|i| i.severity == Severity::Medium));
    assert!(report.issues.iter().all(|i| i.server.as_deref() == Some("fs")));
    assert_eq!(report.critical_count(), 0);
    assert_eq!(report.warning_count(), 2);
}

#[test]
fn test_non_object_entry_is_invalid() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"bad":"node server.js","ok":{"command":"node"}}}"#);

    let report = diagnose(&path, &test_config(&dir), &StubProbe::default());

    assert_eq!(report.server_count, 2);
    assert_eq!(issue_types(&report), vec![IssueType::InvalidEntry]);
    assert_eq!(report.issues[0].server.as_deref(), Some("bad"));
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_disabled_issue_types_are_dropped() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{"command":"node","env":{"K":""}}}}"#);
    let mut config = test_config(&dir);
    config.checks.disabled.push(IssueType::EmptyEnvVar);

    let report = diagnose(&path, &config, &StubProbe::default());

    assert!(report.issues.is_empty());
}

#[test]
fn test_severity_override_applies() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{"command":"node","env":{"K":""}}}}"#);
    let mut config = test_config(&dir);
    config
        .checks
        .severity_overrides
        .insert("empty_env_var".to_string(), Severity::High);

    let report = diagnose(&path, &config, &StubProbe::default());

    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].severity, Severity::High);
    assert_eq!(report.critical_count(), 1);
}
