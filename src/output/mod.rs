use chrono::Utc;
use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::checks::{Issue, Severity};

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Standardized output structure for all mcpmend commands
#[derive(Debug, Clone, Serialize)]
pub struct MendOutput {
    pub command: String,
    pub success: bool,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl MendOutput {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            success: true,
            timestamp: Utc::now().to_rfc3339(),
            issues: Vec::new(),
            data: None,
        }
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize `value` into the data field
    pub fn with_payload<T: Serialize>(self, value: &T) -> anyhow::Result<Self> {
        Ok(self.with_data(serde_json::to_value(value)?))
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Icon for an issue of `severity`
pub fn severity_icon(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical | Severity::High => "✗".red(),
        Severity::Medium => "⚠".yellow(),
        Severity::Low => "ℹ".blue(),
    }
}

/// Print one issue in the shared text layout
pub fn print_issue(issue: &Issue) {
    let scope = issue
        .server
        .as_deref()
        .map(|s| format!(" [{}]", s))
        .unwrap_or_default();
    println!(
        "{} {}{} {}",
        severity_icon(issue.severity),
        issue.issue_type,
        scope.cyan(),
        format!("({})", issue.severity).dimmed()
    );
    println!("  {}", issue.message.dimmed());
    println!("  {} {}", "Fix:".cyan(), issue.fix);
}

/// Print a titled bullet list, skipping it when empty
pub fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{}", title.bold());
    for item in items {
        println!("  {} {}", "→".cyan(), item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::IssueType;

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_envelope_skips_empty_fields() {
        let json = MendOutput::new("deps").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["command"], "deps");
        assert_eq!(value["success"], true);
        assert!(value.get("issues").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_envelope_carries_issues_and_payload() {
        let issue = Issue::critical(IssueType::MissingCommand, "m", "f");
        let output = MendOutput::new("diagnose")
            .with_success(false)
            .with_issues(vec![issue])
            .with_payload(&serde_json::json!({"serverCount": 1}))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
        assert_eq!(value["issues"][0]["type"], "missing_command");
        assert_eq!(value["data"]["serverCount"], 1);
    }
}
