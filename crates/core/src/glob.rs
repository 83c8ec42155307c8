//! Glob patterns over module ids, packages, and artifact paths.
//!
//! Pattern syntax is deliberately small: `*` matches any sequence (including
//! the empty one) and every other character is literal, `.` included.

use regex::Regex;
use tracing::warn;

/// Translate a glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$"))
}

/// Returns true when `value` matches the glob `pattern`.
pub fn matches(pattern: &str, value: &str) -> bool {
    glob_to_regex(pattern).map(|re| re.is_match(value)).unwrap_or(false)
}

/// Normalize module id notations (`group:artifact`, `:project:path`) to dotted form.
pub fn normalize_id(id: &str) -> String {
    let dotted: String =
        id.chars().map(|c| if matches!(c, ':' | '/' | '\\') { '.' } else { c }).collect();
    dotted.trim_matches('.').to_string()
}

/// True if at least one include pattern and no exclude pattern matches the normalized id.
pub fn should_include(id: &str, includes: &[String], excludes: &[String]) -> bool {
    let normalized = normalize_id(id);
    includes.iter().any(|p| matches(p, &normalized))
        && !excludes.iter().any(|p| matches(p, &normalized))
}

/// A list of globs compiled once and matched many times.
#[derive(Debug, Clone)]
pub struct GlobSet {
    patterns: Vec<(String, Regex)>,
}

impl GlobSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match glob_to_regex(pattern) {
                Ok(re) => compiled.push((pattern.to_string(), re)),
                // Only reachable through regex size limits on huge patterns.
                Err(err) => warn!(pattern, %err, "skipping glob that does not compile"),
            }
        }
        Self { patterns: compiled }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches_any(&self, value: &str) -> bool {
        self.patterns.iter().any(|(_, re)| re.is_match(value))
    }

    /// The first pattern (in declaration order) matching `value`.
    pub fn first_match(&self, value: &str) -> Option<&str> {
        self.patterns.iter().find(|(_, re)| re.is_match(value)).map(|(p, _)| p.as_str())
    }
}

/// Include/exclude filter over module ids.
#[derive(Debug, Clone)]
pub struct ModuleFilter {
    includes: GlobSet,
    excludes: GlobSet,
}

impl ModuleFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Self {
        Self { includes: GlobSet::new(includes), excludes: GlobSet::new(excludes) }
    }

    pub fn should_include(&self, id: &str) -> bool {
        let normalized = normalize_id(id);
        self.includes.matches_any(&normalized) && !self.excludes.matches_any(&normalized)
    }
}
