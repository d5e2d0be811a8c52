//! Runtime dependency probe

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{platform, timestamp, ProbeStatus};
use crate::config::DependencySpec;
use crate::probe::{HostProbe, ProbePool};

pub const INSTALL_CRITICAL_FIRST: &str = "Install missing critical dependencies first";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyStatus {
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Set when a fallback command answered instead of the first one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl DependencyStatus {
    pub fn is_installed(&self) -> bool {
        self.status == ProbeStatus::Installed
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySummary {
    pub all_required: bool,
    pub missing_critical: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Result of `probe_dependencies`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReport {
    pub timestamp: String,
    pub platform: String,
    pub dependencies: BTreeMap<String, DependencyStatus>,
    pub summary: DependencySummary,
}

/// Probe every dependency concurrently; results keep the order of `specs`
pub async fn probe_dependencies(
    specs: &[DependencySpec],
    probe: Arc<dyn HostProbe>,
    pool: &ProbePool,
) -> DependencyReport {
    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        let probe = Arc::clone(&probe);
        let pool = pool.clone();
        let commands = spec.commands.clone();
        let label = format!("dependency {}", spec.name);
        handles.push(tokio::spawn(async move {
            pool.run(label, move || find_installed(probe.as_ref(), &commands))
                .await
        }));
    }

    let mut found = Vec::with_capacity(specs.len());
    for handle in handles {
        let answer = match handle.await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                debug!(error = %e, "dependency probe unavailable");
                None
            }
            Err(e) => {
                debug!(error = %e, "dependency probe task failed");
                None
            }
        };
        found.push(answer);
    }

    summarize(specs, found)
}

/// First command that answers `--version`, with its output
fn find_installed(probe: &dyn HostProbe, commands: &[String]) -> Option<(String, String)> {
    commands.iter().find_map(|command| match probe.command_version(command) {
        Ok(version) => Some((command.clone(), version)),
        Err(e) => {
            debug!(command = %command, error = %e, "version query failed");
            None
        }
    })
}

/// Build the report from per-spec probe answers (same order as `specs`)
pub fn summarize(specs: &[DependencySpec], found: Vec<Option<(String, String)>>) -> DependencyReport {
    let mut dependencies = BTreeMap::new();
    let mut summary = DependencySummary {
        all_required: true,
        ..DependencySummary::default()
    };
    let mut optional_recommendations = Vec::new();
    let mut version_recommendations = Vec::new();

    for (spec, answer) in specs.iter().zip(found) {
        let status = match answer {
            Some((command, version)) => {
                if let Some(ref min) = spec.min_version {
                    if let Some(advice) = version_advice(&spec.name, &version, min) {
                        version_recommendations.push(advice);
                    }
                }
                let fallback = spec.commands.first() != Some(&command);
                DependencyStatus {
                    status: ProbeStatus::Installed,
                    version: Some(version),
                    command: fallback.then_some(command),
                    required: spec.required,
                    note: None,
                    fix: None,
                }
            }
            None => {
                if spec.required {
                    summary.all_required = false;
                    summary.missing_critical.push(spec.name.clone());
                } else if let Some(ref recommendation) = spec.recommendation {
                    optional_recommendations.push(recommendation.clone());
                }
                DependencyStatus {
                    status: ProbeStatus::Missing,
                    version: None,
                    command: None,
                    required: spec.required,
                    note: spec.note.clone(),
                    fix: spec.fix.clone(),
                }
            }
        };
        dependencies.insert(spec.name.clone(), status);
    }

    if !summary.missing_critical.is_empty() {
        summary.recommendations.push(INSTALL_CRITICAL_FIRST.to_string());
    }
    summary.recommendations.extend(optional_recommendations);
    summary.recommendations.extend(version_recommendations);

    DependencyReport {
        timestamp: timestamp(),
        platform: platform().to_string(),
        dependencies,
        summary,
    }
}

fn version_advice(name: &str, reported: &str, min_version: &str) -> Option<String> {
    let minimum = semver::Version::parse(min_version).ok()?;
    let installed = parse_version_lenient(reported)?;
    if installed < minimum {
        Some(format!(
            "Upgrade {} to {} or newer (found {})",
            name, minimum, installed
        ))
    } else {
        None
    }
}

/// Pull a version out of `--version` output such as `Python 3.11.4`,
/// `v20.10.0` or `uv 0.4.18 (abc 2024-10-01)`
pub fn parse_version_lenient(output: &str) -> Option<semver::Version> {
    let pattern = Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok()?;
    let caps = pattern.captures(output)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(semver::Version::new(part(1), part(2), part(3)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MendConfig;
    use crate::probe::testing::FakeProbe;
    use std::time::Duration;

    fn defaults() -> Vec<DependencySpec> {
        MendConfig::default().probes.dependencies
    }

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(parse_version_lenient("v20.10.0"), Some(semver::Version::new(20, 10, 0)));
        assert_eq!(parse_version_lenient("Python 3.11"), Some(semver::Version::new(3, 11, 0)));
        assert_eq!(
            parse_version_lenient("uv 0.4.18 (abc 2024-10-01)"),
            Some(semver::Version::new(0, 4, 18))
        );
        assert_eq!(parse_version_lenient("unknown"), None);
    }

    #[tokio::test]
    async fn test_all_installed() {
        let probe = FakeProbe::default()
            .with_version("node", "v20.10.0")
            .with_version("npm", "10.2.3")
            .with_version("npx", "10.2.3")
            .with_version("python", "Python 3.12.1")
            .with_version("uv", "uv 0.4.18");
        let pool = ProbePool::new(8, Duration::from_secs(1));

        let report = probe_dependencies(&defaults(), Arc::new(probe), &pool).await;

        assert!(report.summary.all_required);
        assert!(report.summary.missing_critical.is_empty());
        assert!(report.summary.recommendations.is_empty());
        assert_eq!(report.dependencies.len(), 5);
        assert_eq!(report.dependencies["nodejs"].version.as_deref(), Some("v20.10.0"));
        assert!(report.dependencies["python"].command.is_none());
    }

    #[tokio::test]
    async fn test_python3_fallback_reports_command() {
        let probe = FakeProbe::default().with_version("python3", "Python 3.11.4");
        let pool = ProbePool::new(8, Duration::from_secs(1));

        let report = probe_dependencies(&defaults(), Arc::new(probe), &pool).await;
        let python = &report.dependencies["python"];

        assert!(python.is_installed());
        assert_eq!(python.command.as_deref(), Some("python3"));
    }

    #[tokio::test]
    async fn test_missing_required_and_optional() {
        let probe = FakeProbe::default()
            .with_version("npm", "10.2.3")
            .with_version("npx", "10.2.3")
            .with_version("python", "Python 3.12.1");
        let pool = ProbePool::new(8, Duration::from_secs(1));

        let report = probe_dependencies(&defaults(), Arc::new(probe), &pool).await;

        assert!(!report.summary.all_required);
        assert_eq!(report.summary.missing_critical, vec!["nodejs"]);
        assert_eq!(report.summary.recommendations[0], INSTALL_CRITICAL_FIRST);
        assert!(report.summary.recommendations[1].contains("UV"));

        let node = &report.dependencies["nodejs"];
        assert_eq!(node.status, ProbeStatus::Missing);
        assert!(node.fix.as_deref().unwrap().contains("nodejs.org"));
        assert_eq!(
            report.dependencies["uv"].note.as_deref(),
            Some("Required for uvx-based MCP servers")
        );
    }

    #[tokio::test]
    async fn test_timed_out_probe_counts_as_missing() {
        let probe = FakeProbe::default()
            .with_version("node", "v20.10.0")
            .slow(Duration::from_millis(300));
        let pool = ProbePool::new(8, Duration::from_millis(20));
        let specs = vec![defaults().remove(0)];

        let report = probe_dependencies(&specs, Arc::new(probe), &pool).await;
        assert_eq!(report.dependencies["nodejs"].status, ProbeStatus::Missing);
        assert_eq!(report.summary.missing_critical, vec!["nodejs"]);
    }

    #[test]
    fn test_min_version_recommendation() {
        let mut specs = defaults();
        specs.truncate(1);
        specs[0].min_version = Some("18.0.0".to_string());

        let old = summarize(&specs, vec![Some(("node".into(), "v16.20.2".into()))]);
        assert_eq!(old.summary.recommendations.len(), 1);
        assert!(old.summary.recommendations[0].contains("18.0.0"));

        let new = summarize(&specs, vec![Some(("node".into(), "v20.1.0".into()))]);
        assert!(new.summary.recommendations.is_empty());
    }
}
