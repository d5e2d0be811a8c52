//! Log mining: recent error lines from the host's server logs, bucketed by
//! likely cause.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::LogSettings;

/// Only this much of the end of each log file is scanned
const TAIL_BYTES: u64 = 256 * 1024;

/// Substrings that mark a line as an error line
const ERROR_MARKERS: [&str; 3] = ["error", "failed", "crash"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileErrors {
    pub file: String,
    pub errors: Vec<String>,
}

/// Counts per cause bucket; one line may land in several buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPatterns {
    pub connection_issues: usize,
    pub config_errors: usize,
    pub dependency_issues: usize,
    pub permission_errors: usize,
    pub port_conflicts: usize,
}

impl ErrorPatterns {
    pub fn total(&self) -> usize {
        self.connection_issues
            + self.config_errors
            + self.dependency_issues
            + self.permission_errors
            + self.port_conflicts
    }
}

/// Result of log mining
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAnalysis {
    pub logs_found: bool,
    pub log_path: String,
    pub recent_errors: Vec<FileErrors>,
    pub patterns: ErrorPatterns,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Mine `dir` for recent error lines.
///
/// A missing directory is an empty analysis. Files that cannot be read are
/// skipped.
pub fn analyze_logs(dir: &Path, settings: &LogSettings) -> LogAnalysis {
    let mut analysis = LogAnalysis::default();

    if !dir.is_dir() {
        debug!(dir = %dir.display(), "no log directory");
        return analysis;
    }

    analysis.logs_found = true;
    analysis.log_path = dir.display().to_string();

    let mut candidates: Vec<(SystemTime, String, std::path::PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                analysis.error = Some(format!("Error analyzing logs: {}", e));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !settings.name_filters.iter().any(|f| name.contains(f.as_str())) {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((modified, name, entry.into_path()));
    }

    // Newest first; name breaks ties so the order is stable
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    for (_, name, path) in candidates.into_iter().take(settings.max_files) {
        let bytes = match read_tail(&path, TAIL_BYTES) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "skipping unreadable log");
                continue;
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        let errors = error_lines(&content, settings.max_lines_per_file);
        if !errors.is_empty() {
            analysis.recent_errors.push(FileErrors { file: name, errors });
        }
    }

    let all: Vec<&str> = analysis
        .recent_errors
        .iter()
        .flat_map(|f| f.errors.iter().map(String::as_str))
        .collect();
    analysis.patterns = classify(&all);

    analysis
}

/// The last `limit` bytes of `path`, starting at a line boundary
fn read_tail(path: &Path, limit: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(limit);
    file.seek(SeekFrom::Start(start))?;

    let mut bytes = Vec::with_capacity((len - start) as usize);
    file.take(limit).read_to_end(&mut bytes)?;

    if start > 0 {
        // The first line was cut by the seek
        let cut = bytes.iter().position(|b| *b == b'\n').map_or(bytes.len(), |i| i + 1);
        bytes.drain(..cut);
    }
    Ok(bytes)
}

/// The last `limit` lines that look like errors, in file order
fn error_lines(content: &str, limit: usize) -> Vec<String> {
    let matching: Vec<&str> = content
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            ERROR_MARKERS.iter().any(|m| lower.contains(m))
        })
        .collect();
    let skip = matching.len().saturating_sub(limit);
    matching[skip..].iter().map(|l| l.to_string()).collect()
}

/// Count error lines per cause bucket
pub fn classify(lines: &[&str]) -> ErrorPatterns {
    let mut patterns = ErrorPatterns::default();
    let has = |line: &str, needles: &[&str]| needles.iter().any(|n| line.contains(n));

    for line in lines {
        let lower = line.to_lowercase();
        if has(&lower, &["connection", "connect"]) {
            patterns.connection_issues += 1;
        }
        if has(&lower, &["config", "json"]) {
            patterns.config_errors += 1;
        }
        if has(&lower, &["not found", "missing"]) {
            patterns.dependency_issues += 1;
        }
        if has(&lower, &["permission", "access denied"]) {
            patterns.permission_errors += 1;
        }
        if has(&lower, &["port", "address in use"]) {
            patterns.port_conflicts += 1;
        }
    }

    patterns
}
