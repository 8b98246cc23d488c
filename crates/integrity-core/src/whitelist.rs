//! Whitelist matching for change notifications
//!
//! A path is whitelisted when any pattern matches either its base file name
//! or its full path. `*` and `?` never cross a `/`. Because the underlying
//! matcher is the `glob` crate, a `**` that forms a whole path component
//! matches any number of directories; `**` next to other characters is
//! malformed and the pattern is skipped.
//!
//! Character classes are negated with `[!...]`, not `[^...]`. There is no
//! backslash escape: a literal metacharacter is written as a class, e.g.
//! `[*]` or `[?]`.

use glob::{MatchOptions, Pattern};
use std::path::Path;
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    patterns: Vec<Pattern>,
}

impl Whitelist {
    /// Compile patterns, dropping any that are malformed.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| match Pattern::new(p.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring malformed whitelist pattern {:?}: {}", p.as_ref(), e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Pattern::as_str)
    }

    pub fn is_whitelisted(&self, path: &str) -> bool {
        let base = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        self.patterns.iter().any(|pattern| {
            pattern.matches_with(base, MATCH_OPTIONS) || pattern.matches_with(path, MATCH_OPTIONS)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_match_anywhere_in_tree() {
        let wl = Whitelist::new(["*.tmp"]);
        assert!(wl.is_whitelisted("temp/x.tmp"));
        assert!(wl.is_whitelisted("/var/www/cache/deep/y.tmp"));
        assert!(!wl.is_whitelisted("temp/x.php"));
    }

    #[test]
    fn full_path_match() {
        let wl = Whitelist::new(["cache/*"]);
        assert!(wl.is_whitelisted("cache/page.php"));
        assert!(!wl.is_whitelisted("cache/sub/page.php"));
        assert!(!wl.is_whitelisted("page.php"));
    }

    #[test]
    fn star_does_not_cross_separator() {
        let wl = Whitelist::new(["/srv/*.php"]);
        assert!(wl.is_whitelisted("/srv/a.php"));
        assert!(!wl.is_whitelisted("/srv/x/a.php"));
    }

    #[test]
    fn question_mark_and_classes() {
        let wl = Whitelist::new(["log?.php", "[abc]_*.php"]);
        assert!(wl.is_whitelisted("x/log1.php"));
        assert!(!wl.is_whitelisted("x/log12.php"));
        assert!(wl.is_whitelisted("b_config.php"));
        assert!(!wl.is_whitelisted("d_config.php"));
    }

    #[test]
    fn malformed_patterns_are_skipped() {
        let wl = Whitelist::new(["[unclosed", "a**b", "*.log"]);
        assert_eq!(wl.len(), 1);
        assert!(wl.is_whitelisted("x/error.log"));
        assert!(!wl.is_whitelisted("[unclosed"));
    }

    #[test]
    fn empty_whitelist_matches_nothing() {
        let wl = Whitelist::default();
        assert!(wl.is_empty());
        assert!(!wl.is_whitelisted("anything.php"));
    }

    #[test]
    fn negated_class_and_literal_metacharacters() {
        let wl = Whitelist::new(["[!a]*.php", "[*]x.txt"]);
        assert!(wl.is_whitelisted("dir/b.php"));
        assert!(!wl.is_whitelisted("dir/a.php"));
        assert!(wl.is_whitelisted("*x.txt"));
        assert!(!wl.is_whitelisted("yx.txt"));
    }

    #[test]
    fn case_sensitive() {
        let wl = Whitelist::new(["*.TMP"]);
        assert!(!wl.is_whitelisted("a.tmp"));
    }
}
