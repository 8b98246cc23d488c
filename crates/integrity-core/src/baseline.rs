//! Flat-text baseline persistence
//!
//! One record per line: `<digest>  <path>`. The two-space separator lets
//! paths contain single spaces; a path containing two consecutive spaces (or
//! a newline) cannot round-trip and will read back as a different record.

use crate::digest::Digest;
use crate::error::{IntegrityError, Result};
use crate::snapshot::Snapshot;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Separator between digest and path on each line.
pub const RECORD_SEPARATOR: &str = "  ";

/// Whether `path` can be stored without corrupting its record.
pub fn is_storable_path(path: &str) -> bool {
    !path.contains(RECORD_SEPARATOR) && !path.contains('\n') && !path.contains('\r')
}

/// Render records in mapping order.
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (path, digest) in snapshot {
        out.push_str(digest.as_str());
        out.push_str(RECORD_SEPARATOR);
        out.push_str(path);
        out.push('\n');
    }
    out
}

/// Parse baseline text. Lines without a separator are skipped; a repeated
/// path keeps its last record.
pub fn parse(text: &str) -> Snapshot {
    parse_bytes(text.as_bytes())
}

/// Parse raw baseline bytes. Lines that are not valid UTF-8 are skipped
/// like any other malformed record.
pub fn parse_bytes(bytes: &[u8]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    let mut skipped = 0usize;
    for raw in bytes.split(|b| *b == b'\n') {
        let Ok(line) = std::str::from_utf8(raw) else {
            skipped += 1;
            continue;
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(RECORD_SEPARATOR) {
            Some((digest, path)) => {
                snapshot.insert(path, Digest::from_hex(digest));
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("Skipped {} malformed baseline lines", skipped);
    }
    snapshot
}

#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored baseline.
    ///
    /// The text is written to a sibling temp file and renamed over the
    /// target, so readers never observe a half-written baseline.
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        for path in snapshot.paths() {
            if !is_storable_path(path) {
                warn!("Path cannot round-trip through the baseline format: {:?}", path);
            }
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| IntegrityError::io(&dir, e))?;
        if let Err(e) = tmp.write_all(render(snapshot).as_bytes()) {
            return Err(IntegrityError::io(tmp.path(), e));
        }
        if let Some(perms) = self.target_permissions() {
            if let Err(e) = tmp.as_file().set_permissions(perms) {
                return Err(IntegrityError::io(tmp.path(), e));
            }
        }
        if let Err(e) = tmp.as_file().sync_all() {
            return Err(IntegrityError::io(tmp.path(), e));
        }
        tmp.persist(&self.path)
            .map_err(|e| IntegrityError::io(&self.path, e.error))?;
        debug!("Baseline saved to {} ({} entries)", self.path.display(), snapshot.len());
        Ok(())
    }

    /// Mode for the replacement file: the current baseline's, or 0644 for a
    /// first write. Temp files start out 0600.
    fn target_permissions(&self) -> Option<fs::Permissions> {
        if let Ok(meta) = fs::metadata(&self.path) {
            return Some(meta.permissions());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Some(fs::Permissions::from_mode(0o644))
        }
        #[cfg(not(unix))]
        {
            None
        }
    }

    /// Load the stored baseline. A missing file is an error.
    pub fn read(&self) -> Result<Snapshot> {
        let bytes = fs::read(&self.path).map_err(|e| IntegrityError::io(&self.path, e))?;
        let snapshot = parse_bytes(&bytes);
        debug!("Baseline loaded from {} ({} entries)", self.path.display(), snapshot.len());
        Ok(snapshot)
    }
}
