use crate::error::{IntegrityError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

const MAX_ROTATIONS: usize = 5;
const CHAIN_START: &str = "CHAIN_START";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSeverity {
    Info,
    Warn,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub severity: EventSeverity,
    pub message: String,
    pub prev_hash: String,
    pub hash: String,
}

/// Outcome of re-checking the hash chain of the active log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub entries: usize,
    /// Sequence number (or line number when unparseable) of the first bad entry.
    pub broken_at: Option<u64>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.broken_at.is_none()
    }
}

/// Append-only, hash-chained JSON-lines log of scan events.
pub struct EventLog {
    path: PathBuf,
    inner: Mutex<LogState>,
    max_bytes: u64,
}

#[derive(Debug)]
struct LogState {
    last_seq: u64,
    last_hash: String,
}

impl EventLog {
    /// Open (or prepare to create) the log at `path`. `max_bytes` of zero
    /// disables rotation.
    ///
    /// An existing file that cannot be read does not stop a run: the error is
    /// reported and the log continues with a fresh chain.
    pub fn new<P: AsRef<Path>>(path: P, max_bytes: u64) -> Self {
        let path = path.as_ref().to_path_buf();
        let (last_seq, last_hash) = match Self::load_state(&path) {
            Ok(state) => state,
            Err(e) => {
                error!("Starting a new event chain: {}", e);
                (0, CHAIN_START.to_string())
            }
        };
        Self {
            path,
            inner: Mutex::new(LogState {
                last_seq,
                last_hash,
            }),
            max_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_state(path: &Path) -> Result<(u64, String)> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((0, CHAIN_START.to_string())),
            Err(e) => {
                return Err(IntegrityError::EventLog(format!(
                    "reading {}: {e}",
                    path.display()
                )))
            }
        };
        let mut last_seq = 0;
        let mut last_hash = CHAIN_START.to_string();
        for raw in bytes.split(|b| *b == b'\n') {
            let line = String::from_utf8_lossy(raw);
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventEntry>(&line) {
                Ok(entry) => {
                    last_seq = entry.seq;
                    last_hash = entry.hash;
                }
                Err(e) => warn!("Unreadable event log line in {}: {}", path.display(), e),
            }
        }
        Ok((last_seq, last_hash))
    }

    fn compute_hash(entry_without_hash: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(entry_without_hash.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn append(
        &self,
        event_type: &str,
        severity: EventSeverity,
        message: &str,
    ) -> Result<EventEntry> {
        let mut state = self.inner.lock();
        self.rotate_if_needed(&mut state)?;
        let seq = state.last_seq + 1;
        let mut entry_value = serde_json::json!({
            "seq": seq,
            "timestamp": Utc::now(),
            "event_type": event_type,
            "severity": severity,
            "message": message,
            "prev_hash": state.last_hash,
        });
        let hash = Self::compute_hash(&entry_value);
        entry_value["hash"] = serde_json::Value::String(hash.clone());

        let entry: EventEntry = serde_json::from_value(entry_value)?;
        self.write_entry(&entry)?;
        state.last_seq = seq;
        state.last_hash = hash;
        Ok(entry)
    }

    fn write_entry(&self, entry: &EventEntry) -> Result<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| IntegrityError::io(&self.path, e))?;
        writeln!(file, "{}", line)
            .and_then(|_| file.flush())
            .map_err(|e| IntegrityError::io(&self.path, e))
    }

    fn rotate_if_needed(&self, state: &mut LogState) -> Result<()> {
        if self.max_bytes == 0 {
            return Ok(());
        }
        match fs::metadata(&self.path) {
            Ok(metadata) if metadata.len() >= self.max_bytes => {}
            _ => return Ok(()),
        }
        for i in (1..=MAX_ROTATIONS).rev() {
            let rotated = self.path_with_suffix(i);
            if rotated.exists() {
                if i == MAX_ROTATIONS {
                    fs::remove_file(&rotated).map_err(|e| IntegrityError::io(&rotated, e))?;
                } else {
                    let next = self.path_with_suffix(i + 1);
                    fs::rename(&rotated, &next).map_err(|e| IntegrityError::io(&rotated, e))?;
                }
            }
        }
        let first = self.path_with_suffix(1);
        fs::rename(&self.path, &first).map_err(|e| IntegrityError::io(&self.path, e))?;
        // new file, new chain; seq stays monotonic
        state.last_hash = CHAIN_START.to_string();
        Ok(())
    }

    /// Most recent entries first.
    pub fn read_recent(&self, limit: Option<usize>) -> Result<Vec<EventEntry>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let file = File::open(&self.path).map_err(|e| IntegrityError::io(&self.path, e))?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IntegrityError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str::<EventEntry>(&line).map_err(|e| {
                IntegrityError::EventLog(format!(
                    "{} line {}: {e}",
                    self.path.display(),
                    lineno + 1
                ))
            })?;
            entries.push(entry);
        }
        entries.reverse();
        if let Some(lim) = limit {
            entries.truncate(lim);
        }
        Ok(entries)
    }

    /// Recompute every hash in the active file and check each link.
    pub fn verify_chain(&self) -> Result<ChainReport> {
        let mut report = ChainReport {
            entries: 0,
            broken_at: None,
        };
        if !self.path.exists() {
            return Ok(report);
        }
        let file = File::open(&self.path).map_err(|e| IntegrityError::io(&self.path, e))?;
        let mut expected_prev = CHAIN_START.to_string();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| IntegrityError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            report.entries += 1;
            let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&line) else {
                report.broken_at = Some(lineno as u64 + 1);
                break;
            };
            let seq = value["seq"].as_u64().unwrap_or(lineno as u64 + 1);
            let stored_hash = value
                .as_object_mut()
                .and_then(|obj| obj.remove("hash"))
                .and_then(|h| h.as_str().map(str::to_string));
            let prev_ok = value["prev_hash"].as_str() == Some(expected_prev.as_str());
            match stored_hash {
                Some(hash) if prev_ok && hash == Self::compute_hash(&value) => {
                    expected_prev = hash;
                }
                _ => {
                    report.broken_at = Some(seq);
                    break;
                }
            }
        }
        Ok(report)
    }

    fn path_with_suffix(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }
}
