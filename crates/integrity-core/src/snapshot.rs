use crate::digest::Digest;
use std::collections::btree_map::{self, BTreeMap};

/// Path to digest mapping, ordered by path.
///
/// Used both for the persisted baseline and for the state computed during a
/// scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, Digest>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the digest it replaced.
    pub fn insert(&mut self, path: impl Into<String>, digest: Digest) -> Option<Digest> {
        self.entries.insert(path.into(), digest)
    }

    pub fn get(&self, path: &str) -> Option<&Digest> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Digest> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a Digest);
    type IntoIter = btree_map::Iter<'a, String, Digest>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<P: Into<String>> FromIterator<(P, Digest)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (P, Digest)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(p, d)| (p.into(), d)).collect(),
        }
    }
}
