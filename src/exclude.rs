//! Exclusion patterns for candidate paths.
//!
//! A pattern excludes a path when it is the path itself, a dot-delimited
//! prefix of it (`app.internal` covers `app.internal.cache.get`) or the last
//! segment of it (`helper` covers `app.util.helper`). A trailing `*` turns the
//! final pattern segment into a prefix match: `debug_*` covers
//! `app.debug_dump`, and `app.test*` covers `app.tests.run`.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeSet {
    patterns: Vec<String>,
}

impl ExcludeSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .map(|p: String| p.trim().to_owned())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| pattern_matches(p, path))
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let last = path.rsplit('.').next().unwrap_or(path);
    match pattern.strip_suffix('*') {
        Some(stem) => {
            if !stem.contains('.') && last.starts_with(stem) {
                return true;
            }
            // Wildcard on the final segment of a dotted pattern: compare the
            // fixed segments exactly, the last one by prefix.
            let (fixed, partial) = match stem.rsplit_once('.') {
                Some((fixed, partial)) => (Some(fixed), partial),
                None => (None, stem),
            };
            let mut segments = path.split('.');
            if let Some(fixed) = fixed {
                for want in fixed.split('.') {
                    if segments.next() != Some(want) {
                        return false;
                    }
                }
            }
            segments.next().is_some_and(|seg| seg.starts_with(partial))
        }
        None => {
            path == pattern
                || path
                    .strip_prefix(pattern)
                    .is_some_and(|rest| rest.starts_with('.'))
                || last == pattern
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_prefix_match() {
        let set = ExcludeSet::new(["app.internal"]);
        assert!(set.is_excluded("app.internal"));
        assert!(set.is_excluded("app.internal.cache.get"));
        assert!(
            !set.is_excluded("app.internals.get"),
            "prefix must end on a segment boundary"
        );
        assert!(!set.is_excluded("app.public"));
    }

    #[test]
    fn bare_name_matches_last_segment() {
        let set = ExcludeSet::new(["helper"]);
        assert!(set.is_excluded("app.util.helper"));
        assert!(!set.is_excluded("app.helper_two"));
        assert!(!set.is_excluded("app.helper.inner"));
    }

    #[test]
    fn trailing_wildcard_on_name() {
        let set = ExcludeSet::new(["debug_*"]);
        assert!(set.is_excluded("app.debug_dump"));
        assert!(set.is_excluded("app.io.debug_"));
        assert!(!set.is_excluded("app.undebug_dump"));
    }

    #[test]
    fn trailing_wildcard_on_dotted_pattern() {
        let set = ExcludeSet::new(["app.test*"]);
        assert!(set.is_excluded("app.tests"));
        assert!(set.is_excluded("app.tests.run"));
        assert!(set.is_excluded("app.testing"));
        assert!(!set.is_excluded("app.io.tests"));
        assert!(!set.is_excluded("other.tests"));
    }

    #[test]
    fn blank_patterns_are_dropped() {
        let set = ExcludeSet::new(["", "  ", "x"]);
        assert_eq!(set.patterns(), ["x".to_owned()]);
        assert!(!ExcludeSet::default().is_excluded("anything"));
    }
}
