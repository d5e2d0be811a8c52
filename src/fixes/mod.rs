//! Remediation playbooks keyed by issue category

use serde::{Deserialize, Serialize};

use crate::checks::IssueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    ConfigSyntax,
    DependencyMissing,
    PortConflict,
    PermissionError,
    ServerCrash,
    General,
}

impl IssueCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            IssueCategory::ConfigSyntax => "config_syntax",
            IssueCategory::DependencyMissing => "dependency_missing",
            IssueCategory::PortConflict => "port_conflict",
            IssueCategory::PermissionError => "permission_error",
            IssueCategory::ServerCrash => "server_crash",
            IssueCategory::General => "general",
        }
    }

    /// Parse a category or issue type name; anything unrecognised is `General`
    pub fn parse(input: Option<&str>) -> Self {
        let Some(raw) = input.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) else {
            return IssueCategory::General;
        };

        if let Ok(category) = serde_json::from_value(serde_json::Value::String(raw.clone())) {
            return category;
        }

        IssueType::parse(&raw)
            .map(Self::from)
            .unwrap_or(IssueCategory::General)
    }
}

impl From<IssueType> for IssueCategory {
    fn from(issue_type: IssueType) -> Self {
        match issue_type {
            IssueType::JsonSyntaxError | IssueType::PathEscaping => IssueCategory::ConfigSyntax,
            IssueType::CommandNotFound => IssueCategory::DependencyMissing,
            IssueType::ConfigUnreadable => IssueCategory::PermissionError,
            IssueType::MissingCommand | IssueType::InvalidEntry | IssueType::EmptyEnvVar => {
                IssueCategory::ServerCrash
            }
            IssueType::ConfigMissing | IssueType::MissingMcpServers => IssueCategory::General,
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remediation recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub issue: String,
    pub solution: String,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preventive: Option<String>,
}

impl Playbook {
    fn new(issue: &str, solution: &str, steps: &[&str], preventive: Option<&str>) -> Self {
        Self {
            issue: issue.to_string(),
            solution: solution.to_string(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            preventive: preventive.map(|p| p.to_string()),
        }
    }
}

/// Playbooks for `category`, most relevant first
pub fn playbooks(category: IssueCategory) -> Vec<Playbook> {
    match category {
        IssueCategory::ConfigSyntax => vec![Playbook::new(
            "JSON syntax errors",
            "Use the repair_syntax tool to automatically repair common issues",
            &[
                "Run repair_syntax with createBackup: true",
                "Review the changes made",
                "Restart Claude Desktop to test",
            ],
            Some("Use a JSON validator when editing the config manually"),
        )],
        IssueCategory::DependencyMissing => vec![
            Playbook::new(
                "Missing Node.js/npm",
                "Install Node.js from the official website",
                &[
                    "Download Node.js LTS from https://nodejs.org/",
                    "Run the installer with default settings",
                    "Restart your terminal/command prompt",
                    "Verify with: node --version && npm --version",
                ],
                Some("Keep Node.js updated to LTS versions"),
            ),
            Playbook::new(
                "Missing Python dependencies",
                "Install Python and package managers",
                &[
                    "Install Python from https://python.org/",
                    "Install UV: pip install uv",
                    "Verify installations",
                ],
                None,
            ),
        ],
        IssueCategory::PortConflict => vec![Playbook::new(
            "Port conflicts between services",
            "Configure different ports or stop conflicting services",
            &[
                "Identify which process is using the port",
                "Either stop the conflicting process",
                "Or configure the MCP server to use a different port (if supported)",
                "Update the MCP configuration accordingly",
            ],
            Some("Document which ports your MCP servers use"),
        )],
        IssueCategory::PermissionError => vec![Playbook::new(
            "File or resource access permissions",
            "Adjust permissions or run with appropriate privileges",
            &[
                "Try running Claude Desktop as Administrator (Windows) or with sudo (macOS/Linux)",
                "Check file permissions on configuration and log directories",
                "Ensure MCP servers have access to required files/directories",
            ],
            Some("Set up proper user permissions during initial configuration"),
        )],
        IssueCategory::ServerCrash => vec![Playbook::new(
            "MCP server crashes or fails to start",
            "Debug the specific server configuration and dependencies",
            &[
                "Check the specific server logs in the logs directory",
                "Verify all dependencies for that server are installed",
                "Test running the server command manually",
                "Check for syntax errors in server-specific configuration",
            ],
            Some("Test each MCP server individually before adding to main config"),
        )],
        IssueCategory::General => vec![
            Playbook::new(
                "General MCP troubleshooting",
                "Systematic diagnosis and fixing approach",
                &[
                    "Run full_report for complete analysis",
                    "Fix critical issues first (config syntax, missing dependencies)",
                    "Test each fix by restarting Claude Desktop",
                    "Check server status after each change",
                    "Review logs for any remaining issues",
                ],
                Some("Regular maintenance and monitoring of MCP configurations"),
            ),
            Playbook::new(
                "Best practices for MCP management",
                "Preventive measures and good practices",
                &[
                    "Keep a backup of working configurations",
                    "Test new MCP servers individually before adding to main config",
                    "Document which servers you use and why",
                    "Regularly update MCP servers and dependencies",
                    "Monitor Claude Desktop logs for early warning signs",
                ],
                None,
            ),
        ],
    }
}

/// Result of `suggest_fixes`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestions {
    pub timestamp: String,
    pub issue_type: String,
    pub fixes: Vec<Playbook>,
}

/// Look up playbooks for a free-form issue name
pub fn suggest_fixes(issue_type: Option<&str>) -> FixSuggestions {
    let category = IssueCategory::parse(issue_type);
    FixSuggestions {
        timestamp: crate::checks::timestamp(),
        issue_type: category.as_str().to_string(),
        fixes: playbooks(category),
    }
}
