//! Environment override resolution.
//!
//! Maps an override name such as `NETWORK_HOSTNAME` onto a tree path using a
//! [`PathIndex`]: exact normalized match first, then the longest indexed
//! prefix (with the unmatched remainder appended as new nested keys), and
//! finally a brand-new path built from the whole name.

use super::index::{PathEntry, PathIndex, best_candidate};
use serde_json::{Map, Number, Value};
use tracing::warn;

/// Result of resolving one override name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub segments: Vec<String>,
    pub path: String,
    /// True when the path does not exist yet and writing it creates keys.
    pub is_new: bool,
}

impl ResolvedPath {
    fn new(segments: Vec<String>, is_new: bool) -> Self {
        let path = segments.join(".");
        Self {
            segments,
            path,
            is_new,
        }
    }
}

/// Split an unmatched name into lowercased path segments, one per `_` piece.
fn split_segments(name: &str) -> impl Iterator<Item = String> + '_ {
    name.split('_').map(str::to_lowercase)
}

/// Find (or synthesize) the tree path an override name refers to.
pub fn resolve(index: &PathIndex, name: &str) -> ResolvedPath {
    // Exact match
    if let Some(best) = index.get(name).and_then(best_candidate) {
        return ResolvedPath::new(best.segments.clone(), false);
    }

    // Longest indexed prefix followed by `_`
    let mut best_prefix: Option<(&str, &[PathEntry])> = None;
    for (normalized, candidates) in index.iter() {
        let is_prefix = name
            .strip_prefix(normalized)
            .is_some_and(|rest| rest.starts_with('_'));
        if !is_prefix {
            continue;
        }
        if best_prefix.is_none_or(|(current, _)| normalized.len() > current.len()) {
            best_prefix = Some((normalized, candidates));
        }
    }

    if let Some((normalized, candidates)) = best_prefix
        && let Some(best) = best_candidate(candidates)
    {
        let remainder = &name[normalized.len() + 1..];
        let mut segments = best.segments.clone();
        segments.extend(split_segments(remainder));
        return ResolvedPath::new(segments, true);
    }

    // No match at all: new path from the root
    ResolvedPath::new(split_segments(name).collect(), true)
}

/// Cast an override string to a scalar.
///
/// Only the literals `true` and `false` become booleans; YAML's `yes`/`no`/`on`
/// forms stay strings. Then integer, then float, else the string unchanged.
/// Numbers may carry surrounding whitespace and `_` separators between digits.
pub fn cast_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Some(text) = numeric_text(raw) {
        if let Ok(int) = text.parse::<i64>() {
            return Value::Number(int.into());
        }
        if let Ok(uint) = text.parse::<u64>() {
            return Value::Number(uint.into());
        }
        if let Ok(float) = text.parse::<f64>()
            && let Some(number) = Number::from_f64(float)
        {
            return Value::Number(number);
        }
    }

    Value::String(raw.to_string())
}

/// Trimmed number text with digit separators removed, or `None` when an
/// underscore is not between two digits.
fn numeric_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'_' {
            let before = i.checked_sub(1).and_then(|j| bytes.get(j));
            let after = bytes.get(i + 1);
            if !before.is_some_and(u8::is_ascii_digit) || !after.is_some_and(u8::is_ascii_digit) {
                return None;
            }
        }
    }
    Some(text.replace('_', ""))
}

/// Write `value` at `segments`, creating intermediate mappings as needed.
///
/// An intermediate node that exists but is not a mapping is replaced by an
/// empty mapping, so a prefix match that extends a leaf always succeeds.
pub fn set_path(tree: &mut Map<String, Value>, segments: &[String], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut node = tree;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = node
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            warn!(
                path = %segments[..=depth].join("."),
                "Replacing non-mapping value to apply nested override"
            );
            *slot = Value::Object(Map::new());
        }
        let Value::Object(map) = slot else {
            return;
        };
        node = map;
    }
    node.insert(leaf.clone(), value);
}
