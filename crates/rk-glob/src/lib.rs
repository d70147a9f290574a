// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Normalise a request path or pattern for comparison.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Returns `true` when `path` equals `prefix` or lives beneath it.
///
/// An empty prefix never matches; it would otherwise claim every route.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return false;
    }
    let path = normalize_path(path);
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Ordered list of api prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSet {
    prefixes: Vec<String>,
}

impl PrefixSet {
    /// Build from raw prefixes, trimming slashes and dropping empties and
    /// duplicates while keeping first-seen order.
    pub fn new(raw: &[String]) -> Self {
        let mut prefixes: Vec<String> = Vec::with_capacity(raw.len());
        for p in raw {
            let p = p.trim_matches('/');
            if !p.is_empty() && !prefixes.iter().any(|seen| seen == p) {
                prefixes.push(p.to_string());
            }
        }
        Self { prefixes }
    }

    /// The first prefix that `path` falls under.
    pub fn matching(&self, path: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| matches_prefix(path, p))
            .map(String::as_str)
    }

    /// Returns `true` if any prefix matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.matching(path).is_some()
    }

    /// The normalised prefixes in configured order.
    pub fn as_slice(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns `true` if no prefixes are configured.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Glob text for a path pattern in which `*` is the only wildcard.
///
/// Runs of `*` collapse to one; every other character is escaped.
pub fn star_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    for (i, piece) in pattern.split('*').enumerate() {
        if i > 0 && !glob.ends_with('*') {
            glob.push('*');
        }
        glob.push_str(&globset::escape(piece));
    }
    glob
}

/// Compiled, ordered set of wildcard path patterns.
#[derive(Debug, Clone)]
pub struct PathPatterns {
    sources: Vec<String>,
    set: Option<GlobSet>,
}

impl PathPatterns {
    /// Compile the given patterns.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let sources: Vec<String> = patterns
            .iter()
            .map(|p| normalize_path(p).to_string())
            .collect();
        let globs: Vec<String> = sources.iter().map(|p| star_glob(p)).collect();
        Ok(Self {
            set: build_globset(&globs)?,
            sources,
        })
    }

    /// An empty pattern set that matches nothing.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            set: None,
        }
    }

    /// Returns `true` if `path` matches any pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.set
            .as_ref()
            .is_some_and(|set| set.is_match(normalize_path(path)))
    }

    /// The first configured pattern (normalised) matching `path`.
    pub fn first_match(&self, path: &str) -> Option<&str> {
        let set = self.set.as_ref()?;
        set.matches(normalize_path(path))
            .into_iter()
            .min()
            .map(|idx| self.sources[idx].as_str())
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// A single compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    matcher: globset::GlobMatcher,
}

impl PathPattern {
    /// Compile one pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let source = normalize_path(pattern).to_string();
        let matcher = Glob::new(&star_glob(&source))
            .with_context(|| format!("invalid glob: {pattern}"))?
            .compile_matcher();
        Ok(Self { source, matcher })
    }

    /// Returns `true` if `path` matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(normalize_path(path))
    }

    /// The normalised pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Compile a list of glob patterns into a [`GlobSet`], returning `None` for empty input.
pub fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut b = GlobSetBuilder::new();
    for p in patterns {
        b.add(Glob::new(p).with_context(|| format!("invalid glob: {p}"))?);
    }
    Ok(Some(b.build()?))
}
