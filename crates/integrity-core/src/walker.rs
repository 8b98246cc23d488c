//! Directory walking with suffix filtering

use crate::error::{IntegrityError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Accepted file-name suffixes, each starting with a `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    suffixes: Vec<String>,
}

impl ExtensionFilter {
    /// Parse a comma-separated list such as `"php, .html"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = suffixes
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| if s.starts_with('.') { s } else { format!(".{s}") })
            .collect();
        Self { suffixes }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Exact, case-sensitive suffix test on a file name.
    pub fn accepts(&self, file_name: &str) -> bool {
        self.suffixes.iter().any(|s| file_name.ends_with(s.as_str()))
    }
}

/// A regular file found under the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub accepted: bool,
}

pub struct TreeWalker {
    root: PathBuf,
    filter: ExtensionFilter,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>, filter: ExtensionFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file under the root, in file-name order.
    ///
    /// Directory symlinks are never descended into. A symlink to anything
    /// other than a directory is yielded like a file and later hashed
    /// through the link; a dangling one therefore fails when hashed. The
    /// iterator stops after the first error.
    pub fn entries(&self) -> impl Iterator<Item = Result<WalkEntry>> + '_ {
        let mut failed = false;
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| {
                if failed {
                    return None;
                }
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        failed = true;
                        let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                        return Some(Err(IntegrityError::Walk { path, source: e }));
                    }
                };
                let file_type = entry.file_type();
                if file_type.is_symlink() {
                    if entry.path().is_dir() {
                        return None;
                    }
                } else if !file_type.is_file() {
                    return None;
                }
                let accepted = entry
                    .file_name()
                    .to_str()
                    .map(|name| self.filter.accepts(name))
                    .unwrap_or(false);
                Some(Ok(WalkEntry {
                    path: entry.into_path(),
                    accepted,
                }))
            })
    }

    /// Accepted files only.
    pub fn accepted(&self) -> impl Iterator<Item = Result<PathBuf>> + '_ {
        self.entries().filter_map(|entry| match entry {
            Ok(WalkEntry { path, accepted: true }) => Some(Ok(path)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parse_normalizes_suffixes() {
        let filter = ExtensionFilter::parse("php, .html,,  inc ");
        assert_eq!(filter.suffixes(), &[".php", ".html", ".inc"]);
    }

    #[test]
    fn suffix_match_is_exact_and_case_sensitive() {
        let filter = ExtensionFilter::parse(".php");
        assert!(filter.accepts("index.php"));
        assert!(!filter.accepts("index.PHP"));
        assert!(!filter.accepts("notaphp"));
        assert!(!filter.accepts("index.php.bak"));

        let bare = ExtensionFilter::new(["php"]);
        assert!(bare.accepts("a.php"));
    }

    #[test]
    fn walk_yields_files_not_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper.php")).unwrap();
        fs::write(dir.path().join("a.php"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("sub/c.php"), b"c").unwrap();

        let walker = TreeWalker::new(dir.path(), ExtensionFilter::parse(".php"));
        let entries: Vec<WalkEntry> = walker.entries().map(|e| e.unwrap()).collect();

        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.path.is_file()));

        let accepted: Vec<PathBuf> = walker.accepted().map(|p| p.unwrap()).collect();
        assert_eq!(
            accepted,
            vec![dir.path().join("a.php"), dir.path().join("sub/c.php")]
        );
    }

    #[test]
    fn missing_root_fails_walk() {
        let dir = tempdir().unwrap();
        let walker = TreeWalker::new(dir.path().join("absent"), ExtensionFilter::parse(".php"));
        let results: Vec<Result<WalkEntry>> = walker.entries().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(IntegrityError::Walk { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn directory_symlinks_are_not_descended() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.php"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let walker = TreeWalker::new(dir.path(), ExtensionFilter::parse(".php"));
        assert_eq!(walker.entries().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn file_symlinks_are_yielded() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("shell.txt"), b"payload").unwrap();
        std::os::unix::fs::symlink("shell.txt", dir.path().join("evil.php")).unwrap();
        std::os::unix::fs::symlink("gone.txt", dir.path().join("dangling.php")).unwrap();

        let walker = TreeWalker::new(dir.path(), ExtensionFilter::parse(".php"));
        let accepted: Vec<PathBuf> = walker.accepted().map(|p| p.unwrap()).collect();
        assert_eq!(
            accepted,
            vec![dir.path().join("dangling.php"), dir.path().join("evil.php")]
        );
    }
}
