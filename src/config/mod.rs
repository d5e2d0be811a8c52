//! Configuration module for mcpmend
//! Handles loading and parsing of `.mcpmend.toml` settings files and the
//! default locations of the host manifest and its logs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checks::{IssueType, Severity};

/// Default settings file name
pub const SETTINGS_FILE: &str = ".mcpmend.toml";

/// Top-level manifest key holding the server entries
pub const SERVERS_KEY: &str = "mcpServers";

/// Ports commonly used by locally launched tool servers
pub const DEFAULT_PORTS: [u16; 6] = [7777, 8080, 3000, 4000, 5000, 8000];

/// Main settings structure for mcpmend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MendConfig {
    #[serde(default)]
    pub manifest: ManifestSettings,

    /// Environment probe settings (timeouts, ports, dependencies)
    #[serde(default)]
    pub probes: ProbeSettings,

    #[serde(default)]
    pub validator: ValidatorSettings,

    #[serde(default)]
    pub logs: LogSettings,

    /// Issue filtering (disabled types, severity overrides)
    #[serde(default)]
    pub checks: ChecksConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestSettings {
    /// Manifest location, overriding the platform default
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Per-probe timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum number of external-process probes in flight
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Candidate ports checked by the port probe
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Runtimes checked by the dependency probe
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<DependencySpec>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_concurrency: default_max_concurrency(),
            ports: default_ports(),
            dependencies: default_dependencies(),
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// An external runtime the dependency probe looks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,

    /// Executables to try in order; the first one that answers `--version` wins
    pub commands: Vec<String>,

    #[serde(default)]
    pub required: bool,

    /// Oldest acceptable version
    #[serde(default)]
    pub min_version: Option<String>,

    #[serde(default)]
    pub note: Option<String>,

    #[serde(default)]
    pub fix: Option<String>,

    /// Recommendation emitted when an optional dependency is missing
    #[serde(default)]
    pub recommendation: Option<String>,
}

impl DependencySpec {
    fn new(name: &str, commands: &[&str], required: bool, fix: &str) -> Self {
        Self {
            name: name.to_string(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            required,
            min_version: None,
            note: None,
            fix: Some(fix.to_string()),
            recommendation: None,
        }
    }

    fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    fn with_recommendation(mut self, recommendation: &str) -> Self {
        self.recommendation = Some(recommendation.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Commands accepted without a search-path lookup
    #[serde(default = "default_known_interpreters")]
    pub known_interpreters: Vec<String>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            known_interpreters: default_known_interpreters(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log directory, overriding the platform default
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_max_lines")]
    pub max_lines_per_file: usize,

    /// A log file is inspected when its name contains any of these
    #[serde(default = "default_name_filters")]
    pub name_filters: Vec<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            max_files: default_max_files(),
            max_lines_per_file: default_max_lines(),
            name_filters: default_name_filters(),
        }
    }
}

/// Configuration for issue filtering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// Issue types to drop from reports
    #[serde(default)]
    pub disabled: Vec<IssueType>,

    /// Override severity for specific issue types, keyed by issue type name
    #[serde(default)]
    pub severity_overrides: HashMap<String, Severity>,
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_max_concurrency() -> usize {
    8
}

fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

fn default_max_files() -> usize {
    5
}

fn default_max_lines() -> usize {
    10
}

fn default_name_filters() -> Vec<String> {
    vec!["mcp".to_string(), "server".to_string()]
}

fn default_known_interpreters() -> Vec<String> {
    ["cmd.exe", "python", "node"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_dependencies() -> Vec<DependencySpec> {
    vec![
        DependencySpec::new(
            "nodejs",
            &["node"],
            true,
            "Install Node.js from https://nodejs.org/",
        ),
        DependencySpec::new(
            "npm",
            &["npm"],
            true,
            "NPM usually comes with Node.js. Reinstall Node.js if missing.",
        ),
        DependencySpec::new(
            "npx",
            &["npx"],
            true,
            "NPX usually comes with npm. Update npm or reinstall Node.js.",
        ),
        DependencySpec::new(
            "python",
            &["python", "python3"],
            false,
            "Install Python from https://python.org/",
        )
        .with_note("Required for Python-based MCP servers")
        .with_recommendation("Consider installing Python for Python-based MCP servers"),
        DependencySpec::new("uv", &["uv"], false, "Install UV: pip install uv")
            .with_note("Required for uvx-based MCP servers")
            .with_recommendation("Consider installing UV for faster Python MCP server management"),
    ]
}

impl MendConfig {
    /// Load settings from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    /// Load settings from a specific path, falling back to defaults when absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let config: MendConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;

        Ok(config)
    }

    /// Load an explicit settings file, or `.mcpmend.toml` from the working directory
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Settings file not found: {}", path.display());
                }
                Self::load_from(path)
            }
            None => Self::load(),
        }
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        let header = "# mcpmend settings\n# Every key is optional; omitted keys use the defaults shown here.\n\n";
        let full_content = format!("{}{}", header, content);

        fs::write(path, full_content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    /// Create a default settings file
    pub fn create_default(path: &Path) -> Result<Self> {
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Check if an issue type is disabled
    pub fn is_issue_disabled(&self, issue_type: IssueType) -> bool {
        self.checks.disabled.contains(&issue_type)
    }

    /// Get severity override for an issue type
    pub fn get_severity_override(&self, issue_type: IssueType) -> Option<Severity> {
        self.checks
            .severity_overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(issue_type.as_str()))
            .map(|(_, severity)| *severity)
    }

    /// Manifest path: explicit argument if it exists, then settings, then platform default
    pub fn manifest_path(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            if path.exists() {
                return path.to_path_buf();
            }
        }
        self.manifest
            .path
            .clone()
            .unwrap_or_else(default_manifest_path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logs.dir.clone().unwrap_or_else(default_log_dir)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.probes.timeout_seconds == 0 {
            anyhow::bail!("probes.timeout_seconds must be at least 1");
        }

        if self.probes.max_concurrency == 0 {
            anyhow::bail!("probes.max_concurrency must be at least 1");
        }

        if self.probes.ports.is_empty() {
            anyhow::bail!("probes.ports must list at least one port");
        }

        for dep in &self.probes.dependencies {
            if dep.commands.is_empty() {
                anyhow::bail!("dependency '{}' has no commands to try", dep.name);
            }
            if let Some(ref min) = dep.min_version {
                semver::Version::parse(min).with_context(|| {
                    format!("Invalid min_version for '{}': {}", dep.name, min)
                })?;
            }
        }

        if self.logs.max_files == 0 || self.logs.max_lines_per_file == 0 {
            anyhow::bail!("logs.max_files and logs.max_lines_per_file must be at least 1");
        }

        Ok(())
    }
}

/// Directory the desktop host keeps its settings in
fn host_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Claude")
}

/// Platform default manifest location
pub fn default_manifest_path() -> PathBuf {
    host_config_dir().join("claude_desktop_config.json")
}

/// Platform default log directory
pub fn default_log_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library").join("Logs").join("Claude");
        }
    }
    host_config_dir().join("logs")
}
