//! Baseline regeneration and comparison scans.
//!
//! Both operations walk the target tree and digest every accepted file
//! before touching anything else. Any unreadable file or directory aborts
//! the operation: a partial view is never written or compared.

use crate::baseline::{is_storable_path, BaselineStore};
use crate::diff::{diff, ChangeSet};
use crate::digest::{hash_file, HashAlgorithm};
use crate::error::{IntegrityError, Result};
use crate::snapshot::Snapshot;
use crate::walker::{ExtensionFilter, TreeWalker};
use crate::whitelist::Whitelist;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct IntegrityScanner {
    walker: TreeWalker,
    algorithm: HashAlgorithm,
}

impl IntegrityScanner {
    pub fn new(root: impl Into<PathBuf>, filter: ExtensionFilter, algorithm: HashAlgorithm) -> Self {
        Self {
            walker: TreeWalker::new(root, filter),
            algorithm,
        }
    }

    /// Digest every accepted file under the root.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new();
        for path in self.walker.accepted() {
            let path = path?;
            let key = path
                .to_str()
                .ok_or_else(|| IntegrityError::NonUtf8Path(path.clone()))?
                .to_string();
            if !is_storable_path(&key) {
                warn!("Path contains a record separator and will not round-trip: {:?}", key);
            }
            let digest = hash_file(&path, self.algorithm)?;
            debug!("{}  {}", digest, key);
            snapshot.insert(key, digest);
        }
        Ok(snapshot)
    }

    /// Rebuild the baseline from the current tree. Returns the record count.
    pub fn regenerate(&self, store: &BaselineStore) -> Result<usize> {
        info!(
            "Generating integrity baseline for {} ({})",
            self.walker.root().display(),
            self.algorithm.as_str()
        );
        let snapshot = self.snapshot()?;
        store.write(&snapshot)?;
        info!("Baseline generated: {} files", snapshot.len());
        Ok(snapshot.len())
    }

    /// Compare the current tree against the stored baseline.
    pub fn scan(&self, store: &BaselineStore, whitelist: &Whitelist) -> Result<ChangeSet> {
        let baseline = store.read()?;
        info!(
            "Running integrity scan of {} against baseline ({} entries)",
            self.walker.root().display(),
            baseline.len()
        );
        let current = self.snapshot()?;
        let changes = diff(&baseline, &current, whitelist);
        info!(
            "Scan complete: {} files, {} changes ({} alertable)",
            current.len(),
            changes.len(),
            changes.alertable().count()
        );
        Ok(changes)
    }
}
