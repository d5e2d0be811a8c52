//! Manifest loading.
//!
//! The manifest is read fresh on every call; nothing is cached between runs.

use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{MendError, Result};

/// Read the raw manifest text
pub fn load_manifest_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(MendError::ConfigMissing(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "read manifest");

    let text = String::from_utf8(bytes).map_err(|e| {
        MendError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    Ok(text)
}

/// Parse manifest text into a JSON value
pub fn parse_manifest(text: &str) -> Result<Value> {
    serde_json::from_str(strip_bom(text)).map_err(|e| MendError::SyntaxError(e.to_string()))
}

/// Some editors on Windows save JSON with a leading BOM
pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}
