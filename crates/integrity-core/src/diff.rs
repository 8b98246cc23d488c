//! Baseline comparison and change classification
//!
//! `diff` walks both mappings in path order and emits at most one record per
//! path: `New` for paths only in the current state, `Removed` for paths only
//! in the baseline, and `Modified` for paths whose digests differ. Every
//! record is classified against the whitelist by path alone, so a given path
//! is classified the same way whatever happened to it.

use crate::digest::Digest;
use crate::snapshot::Snapshot;
use crate::whitelist::Whitelist;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Whitelisted,
    Alertable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub path: String,
    pub kind: ChangeKind,
    pub classification: Classification,
    /// Digest recorded in the baseline, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    /// Digest computed during the scan, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

impl ChangeRecord {
    fn new(
        path: &str,
        kind: ChangeKind,
        whitelist: &Whitelist,
        previous: Option<&Digest>,
        current: Option<&Digest>,
    ) -> Self {
        let classification = if whitelist.is_whitelisted(path) {
            Classification::Whitelisted
        } else {
            Classification::Alertable
        };
        Self {
            path: path.to_string(),
            kind,
            classification,
            previous: previous.map(|d| d.as_str().to_string()),
            current: current.map(|d| d.as_str().to_string()),
        }
    }

    pub fn is_alertable(&self) -> bool {
        self.classification == Classification::Alertable
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.classification, self.kind) {
            (Classification::Alertable, ChangeKind::New) => {
                write!(f, "New file detected: {}", self.path)
            }
            (Classification::Alertable, ChangeKind::Modified) => {
                write!(f, "Modified file: {}", self.path)
            }
            (Classification::Alertable, ChangeKind::Removed) => {
                write!(f, "File missing: {}", self.path)
            }
            (Classification::Whitelisted, ChangeKind::New) => {
                write!(f, "Whitelisted new file: {}", self.path)
            }
            (Classification::Whitelisted, ChangeKind::Modified) => {
                write!(f, "Whitelisted modified file: {}", self.path)
            }
            (Classification::Whitelisted, ChangeKind::Removed) => {
                write!(f, "Whitelisted file removed: {}", self.path)
            }
        }
    }
}

/// Classified result of one comparison, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    records: Vec<ChangeRecord>,
}

impl ChangeSet {
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn alertable(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(|r| r.is_alertable())
    }

    pub fn whitelisted(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(|r| !r.is_alertable())
    }

    pub fn has_alertable(&self) -> bool {
        self.alertable().next().is_some()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn paths(&self, kind: ChangeKind) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(move |r| r.kind == kind)
            .map(|r| r.path.as_str())
    }
}

/// Compare the current state against the baseline.
pub fn diff(baseline: &Snapshot, current: &Snapshot, whitelist: &Whitelist) -> ChangeSet {
    let mut records = Vec::new();
    let mut old = baseline.iter().peekable();
    let mut new = current.iter().peekable();

    loop {
        let order = match (old.peek(), new.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((old_path, _)), Some((new_path, _))) => old_path.cmp(new_path),
        };
        match order {
            Ordering::Less => {
                if let Some((path, digest)) = old.next() {
                    records.push(ChangeRecord::new(
                        path,
                        ChangeKind::Removed,
                        whitelist,
                        Some(digest),
                        None,
                    ));
                }
            }
            Ordering::Greater => {
                if let Some((path, digest)) = new.next() {
                    records.push(ChangeRecord::new(
                        path,
                        ChangeKind::New,
                        whitelist,
                        None,
                        Some(digest),
                    ));
                }
            }
            Ordering::Equal => {
                if let (Some((path, expected)), Some((_, actual))) = (old.next(), new.next()) {
                    if expected != actual {
                        records.push(ChangeRecord::new(
                            path,
                            ChangeKind::Modified,
                            whitelist,
                            Some(expected),
                            Some(actual),
                        ));
                    }
                }
            }
        }
    }

    ChangeSet { records }
}
