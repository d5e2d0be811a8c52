//! mcpmend - MCP manifest doctor
//! Diagnoses and repairs the JSON launch manifest a desktop assistant uses to
//! start its tool servers: syntax repair, entry validation, environment
//! probes, log mining and an aggregated health report.

pub mod checks;
pub mod config;
pub mod error;
pub mod fixes;
pub mod logs;
pub mod manifest;
pub mod mcp;
pub mod output;
pub mod probe;
pub mod repair;
pub mod report;
pub mod utils;

// Re-export main types for convenience
pub use checks::{diagnose, DiagnosticReport, Issue, IssueType, Severity};
pub use config::MendConfig;
pub use error::{MendError, Result};
pub use fixes::{suggest_fixes, IssueCategory, Playbook};
pub use logs::{analyze_logs, LogAnalysis};
pub use output::{MendOutput, OutputFormat};
pub use probe::{HostProbe, PortState, ProbePool, SystemProbe};
pub use repair::{apply_repair, RepairOutcome, RepairResult};
pub use report::{full_report, FullReport, HealthSummary, OverallStatus, Section};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
