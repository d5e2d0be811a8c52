//! Writing a repaired manifest back to disk.
//!
//! The write path is: back up the original with create-new semantics, read
//! the backup back and compare digests, write the repaired text to a sibling
//! temp file, rename it over the manifest. If any step fails the manifest is
//! left as it was.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::repair;
use crate::error::{MendError, Result};
use crate::manifest;

/// Attempts at finding an unused backup name within the same millisecond
const BACKUP_NAME_ATTEMPTS: u64 = 16;

pub const BACKUP_REQUIRED: &str =
    "A backup is required before the manifest can be rewritten; retry with createBackup enabled";

/// Result of `repair_syntax`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairResult {
    pub success: bool,
    pub backup_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_sha256: Option<String>,
    pub fixes_applied: Vec<String>,
    pub errors: Vec<String>,
    pub config_path: String,
}

/// Repair the manifest at `path` in place.
///
/// Failures are reported through `success` and `errors`. A failed backup or
/// write leaves the manifest as it was.
pub fn apply_repair(path: &Path, create_backup: bool) -> RepairResult {
    let mut result = RepairResult {
        config_path: path.display().to_string(),
        ..RepairResult::default()
    };

    let original = match manifest::load_manifest_text(path) {
        Ok(text) => text,
        Err(MendError::ConfigMissing(_)) => {
            result.errors.push("Config file does not exist".to_string());
            return result;
        }
        Err(e) => {
            result.errors.push(format!("Error reading config: {}", e));
            return result;
        }
    };

    let outcome = repair(&original);
    result.fixes_applied = outcome.applied_fixes.clone();

    if !outcome.repaired && !outcome.still_invalid {
        debug!(path = %path.display(), "manifest already parses");
        result.success = true;
        return result;
    }

    if outcome.still_invalid {
        if let Some(error) = outcome.error {
            result.errors.push(error);
        }
        return result;
    }

    if !create_backup {
        result.errors.push(BACKUP_REQUIRED.to_string());
        return result;
    }

    let (backup_path, digest) = match write_verified_backup(path, original.as_bytes()) {
        Ok(backup) => backup,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "backup failed, manifest left as is");
            result.errors.push(describe(&e));
            return result;
        }
    };
    result.backup_created = true;
    result.backup_path = Some(backup_path.display().to_string());
    result.backup_sha256 = Some(digest);

    if let Err(e) = replace_atomically(path, outcome.content.as_bytes()) {
        warn!(path = %path.display(), error = %e, "write failed, manifest left as is");
        result.errors.push(describe(&e));
        return result;
    }
    info!(
        path = %path.display(),
        backup = %backup_path.display(),
        fixes = ?result.fixes_applied,
        "manifest repaired"
    );

    result.success = true;
    result
}

/// Error message followed by its underlying cause
fn describe(err: &MendError) -> String {
    match std::error::Error::source(err) {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    }
}

/// `<path>.backup.<epoch-millis>`
pub fn backup_path_for(path: &Path, millis: u64) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(format!(".backup.{}", millis));
    PathBuf::from(name)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(format!(".tmp.{}", std::process::id()));
    PathBuf::from(name)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `content` to a fresh backup file and confirm it reads back intact
fn write_verified_backup(path: &Path, content: &[u8]) -> Result<(PathBuf, String)> {
    let start = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let expected = sha256_hex(content);

    let mut attempt = 0;
    let (backup_path, mut file) = loop {
        let candidate = backup_path_for(path, start + attempt);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => break (candidate, file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt + 1 < BACKUP_NAME_ATTEMPTS => {
                attempt += 1;
            }
            Err(e) => return Err(MendError::io_failure("create backup", candidate, e)),
        }
    };

    file.write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|e| MendError::io_failure("write backup", &backup_path, e))?;
    drop(file);

    let written = fs::read(&backup_path)
        .map_err(|e| MendError::io_failure("verify backup", &backup_path, e))?;
    let actual = sha256_hex(&written);
    if actual != expected {
        warn!(backup = %backup_path.display(), "backup digest mismatch");
        return Err(MendError::io_failure(
            "verify backup",
            &backup_path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("digest {} does not match {}", actual, expected),
            ),
        ));
    }

    debug!(backup = %backup_path.display(), sha256 = %expected, "backup verified");
    Ok((backup_path, expected))
}

/// Replace `path` with `content` via a sibling temp file and a rename
fn replace_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = temp_path_for(path);

    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(content)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(MendError::io_failure("write temp file", &tmp, e));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(MendError::io_failure("replace manifest", path, e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_path_naming() {
        let path = backup_path_for(Path::new("/cfg/claude_desktop_config.json"), 1700000000123);
        assert_eq!(
            path,
            PathBuf::from("/cfg/claude_desktop_config.json.backup.1700000000123")
        );
    }

    #[test]
    fn test_backup_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("m.json");

        let (first, _) = write_verified_backup(&manifest, b"one").unwrap();
        let (second, _) = write_verified_backup(&manifest, b"two").unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_replace_atomically_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("m.json");
        fs::write(&manifest, "old").unwrap();

        replace_atomically(&manifest, b"new").unwrap();

        assert_eq!(fs::read_to_string(&manifest).unwrap(), "new");
        assert!(!temp_path_for(&manifest).exists());
    }

    #[test]
    fn test_backup_failure_leaves_manifest_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("m.json");
        let broken = "{\"mcpServers\": {\"a\": {\"command\": \"node\",}}}";
        fs::write(&manifest, broken).unwrap();

        // A directory squatting on every candidate backup name makes create_new fail
        let now = chrono::Utc::now().timestamp_millis() as u64;
        for offset in 0..2000 {
            fs::create_dir(backup_path_for(&manifest, now + offset)).unwrap();
        }

        let result = apply_repair(&manifest, true);
        assert!(!result.success);
        assert!(!result.backup_created);
        assert_eq!(result.fixes_applied, vec!["remove_trailing_separator"]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Failed to create backup"));
        assert_eq!(fs::read_to_string(&manifest).unwrap(), broken);
    }

    #[test]
    fn test_describe_appends_cause_once() {
        let err = MendError::io_failure(
            "replace manifest",
            "/cfg/m.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(describe(&err), "Failed to replace manifest /cfg/m.json: denied");
    }
}
