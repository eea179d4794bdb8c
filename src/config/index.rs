//! Normalized-path index over a configuration tree.
//!
//! Every leaf (any value that is not a mapping) is indexed under its dotted
//! path normalized to environment-variable form: uppercase, with each
//! character outside `[A-Za-z0-9]` replaced by `_`. Distinct dotted paths can
//! normalize to the same name (`a.b_c` and `a_b.c` both become `A_B_C`), so
//! each name maps to every candidate in tree order.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").expect("static pattern is valid"));

/// One indexed leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// Keys from the tree root to the leaf.
    pub segments: Vec<String>,
    /// Segments joined with `.`.
    pub path: String,
}

impl PathEntry {
    pub fn new(segments: Vec<String>) -> Self {
        let path = segments.join(".");
        Self { segments, path }
    }

    /// Tie-break score: (underscore count, dot count), compared lexicographically.
    pub fn score(&self) -> (usize, usize) {
        path_score(&self.path)
    }
}

/// Normalize a dotted path to environment-variable form.
pub fn normalize_path(path: &str) -> String {
    NON_ALNUM.replace_all(path, "_").to_uppercase()
}

/// Score a dotted path for tie-breaking. Higher wins.
///
/// Paths with more explicit word separation rank above abbreviated ones:
/// underscores dominate, dots break remaining ties.
pub fn path_score(path: &str) -> (usize, usize) {
    let underscores = path.matches('_').count();
    let dots = path.matches('.').count();
    (underscores, dots)
}

/// Pick the highest-scoring candidate. Equal scores keep the earliest one.
pub fn best_candidate(candidates: &[PathEntry]) -> Option<&PathEntry> {
    candidates.iter().fold(None, |best: Option<&PathEntry>, entry| match best {
        Some(current) if current.score() >= entry.score() => Some(current),
        _ => Some(entry),
    })
}

/// Map from normalized name to every leaf path that normalizes to it.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    entries: HashMap<String, Vec<PathEntry>>,
}

impl PathIndex {
    /// Index every leaf of `tree`.
    pub fn build(tree: &Map<String, Value>) -> Self {
        let mut index = Self::default();
        let mut path = Vec::new();
        index.walk_map(tree, &mut path);
        index
    }

    fn walk_map(&mut self, map: &Map<String, Value>, path: &mut Vec<String>) {
        for (key, value) in map {
            path.push(key.clone());
            match value {
                Value::Object(child) => self.walk_map(child, path),
                _ => self.insert(PathEntry::new(path.clone())),
            }
            path.pop();
        }
    }

    fn insert(&mut self, entry: PathEntry) {
        self.entries
            .entry(normalize_path(&entry.path))
            .or_default()
            .push(entry);
    }

    /// All candidates for an exact normalized name.
    pub fn get(&self, normalized: &str) -> Option<&[PathEntry]> {
        self.entries.get(normalized).map(Vec::as_slice)
    }

    /// Iterate over (normalized name, candidates) pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathEntry])> {
        self.entries
            .iter()
            .map(|(name, candidates)| (name.as_str(), candidates.as_slice()))
    }

    /// Number of distinct normalized names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
