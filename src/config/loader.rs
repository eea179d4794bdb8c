//! Configuration store with layered overrides.
//!
//! Loads every `<name>.config.yaml` source into one tree keyed by source name,
//! then applies the override layers from lowest to highest priority.

use super::index::PathIndex;
use super::merge::deep_merge;
use super::resolver::{ResolvedPath, cast_value, resolve, set_path};
use crate::error::BuildError;
use anyhow::Result;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File suffix that marks a configuration source.
pub const CONFIG_SUFFIX: &str = ".config.yaml";

/// Name of the source that carries the testing override layer.
pub const TESTING_SOURCE: &str = "testing";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// `*.config.yaml` sources as loaded (lowest priority)
    Base = 0,
    /// Sections of `testing.config.yaml` when its `testing` flag is truthy
    Testing = 1,
    /// Environment variable overrides (highest priority)
    Environment = 2,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Base => write!(f, "base"),
            ConfigTier::Testing => write!(f, "testing"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// One named configuration source.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Logical name; becomes the root key of the tree.
    pub name: String,
    /// Raw YAML text.
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a `<name>.config.yaml` file. Returns `None` for other file names.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let Some(name) = source_name(path) else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Ok(Some(Self::new(name, content)))
    }
}

/// Logical source name of a config file: its file name minus `.config.yaml`.
pub fn source_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let name = file_name.strip_suffix(CONFIG_SUFFIX)?;
    (!name.is_empty()).then(|| name.to_string())
}

/// List the config sources in `dir`, sorted by file name.
///
/// A missing directory yields no sources.
pub fn discover_sources(dir: &Path) -> Result<Vec<ConfigSource>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Config directory not found, using empty tree");
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| BuildError::io(dir, e))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && source_name(path).is_some())
        .collect();
    paths.sort();

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(source) = ConfigSource::from_file(&path)? {
            sources.push(source);
        }
    }
    Ok(sources)
}

/// Parse one source, applying the auto-unwrap rule.
///
/// A mapping with exactly one key equal to the source name is replaced by that
/// key's value: `identity.config.yaml` holding `identity: {...}` unwraps, while
/// `network.config.yaml` holding only `host: ...` does not.
fn parse_source(source: &ConfigSource) -> Result<Value> {
    let value = crate::yaml::parse_document(&source.content)
        .map_err(|e| BuildError::config_parse(&source.name, e))?;

    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key(&source.name) => {
            Ok(map.remove(&source.name).unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// Variables from an OS environment whose names start with `prefix`.
///
/// Names that are not valid UTF-8 cannot carry the prefix and are dropped
/// silently; a prefixed variable with a non-UTF-8 value is skipped with a
/// warning.
pub fn prefixed_vars<I>(vars: I, prefix: &str) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let name = name.into_string().ok()?;
            if !name.starts_with(prefix) {
                return None;
            }
            match value.into_string() {
                Ok(value) => Some((name, value)),
                Err(_) => {
                    warn!(var = %name, "Skipping override with a non-UTF-8 value");
                    None
                }
            }
        })
        .collect()
}

/// The resolved configuration tree.
///
/// Built once per run; after [`ConfigStore::apply_env_overrides`] it is only
/// read (as rendering context).
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    data: Map<String, Value>,
}

impl ConfigStore {
    /// Load sources from `config_dir` and apply every override layer, taking
    /// environment overrides from the process environment.
    pub fn load(config_dir: &Path, env_prefix: &str) -> Result<Self> {
        let sources = discover_sources(config_dir)?;
        let mut store = Self::from_sources(sources)?;
        store.apply_env_overrides(prefixed_vars(std::env::vars_os(), env_prefix), env_prefix);
        Ok(store)
    }

    /// Build the tree from sources and apply the testing layer.
    ///
    /// Any source that fails to parse aborts the whole build.
    pub fn from_sources(sources: impl IntoIterator<Item = ConfigSource>) -> Result<Self> {
        let mut data = Map::new();
        for source in sources {
            let value = parse_source(&source)?;
            debug!(source = %source.name, tier = %ConfigTier::Base, "Loaded config source");
            data.insert(source.name, value);
        }

        let mut store = Self { data };
        store.apply_testing_overrides();
        Ok(store)
    }

    /// Merge sections of the testing source over their base counterparts.
    ///
    /// Only active when the testing source is a mapping whose `testing` key is
    /// truthy (`true`, a non-zero number, a non-empty string or collection).
    /// Each other key is deep-merged into the same-named root key; mappings
    /// merge recursively and anything else replaces the base value.
    fn apply_testing_overrides(&mut self) {
        let Some(Value::Object(testing)) = self.data.get(TESTING_SOURCE) else {
            return;
        };
        if testing
            .get(TESTING_SOURCE)
            .is_none_or(crate::yaml::is_empty_document)
        {
            return;
        }

        let sections: Vec<(String, Value)> = testing
            .iter()
            .filter(|(key, _)| key.as_str() != TESTING_SOURCE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in sections {
            debug!(section = %key, tier = %ConfigTier::Testing, "Applying testing override");
            let merged = match self.data.get_mut(&key) {
                Some(base) => deep_merge(base.take(), value),
                None => value,
            };
            self.data.insert(key, merged);
        }
    }

    /// Apply environment-style overrides.
    ///
    /// Variables not starting with `prefix` are ignored; the prefix is stripped
    /// before matching. An empty prefix accepts every variable. Variables are
    /// applied in name order against an index built once, before the first
    /// override is written.
    pub fn apply_env_overrides<I, K, V>(&mut self, vars: I, prefix: &str)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut overrides: Vec<(String, String)> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter_map(|(name, value)| {
                name.strip_prefix(prefix)
                    .map(|stripped| (stripped.to_string(), value))
            })
            .filter(|(name, _)| !name.is_empty())
            .collect();
        overrides.sort_by(|a, b| a.0.cmp(&b.0));

        if overrides.is_empty() {
            return;
        }

        let index = PathIndex::build(&self.data);
        for (name, raw) in overrides {
            let resolved = resolve(&index, &name);
            self.write_override(&resolved, &raw);
        }
    }

    fn write_override(&mut self, resolved: &ResolvedPath, raw: &str) {
        debug!(
            path = %resolved.path,
            is_new = resolved.is_new,
            tier = %ConfigTier::Environment,
            "Applying override"
        );
        set_path(&mut self.data, &resolved.segments, cast_value(raw));
    }

    /// Resolve a single override against the current tree without applying it.
    pub fn resolve_override(&self, name: &str) -> ResolvedPath {
        resolve(&PathIndex::build(&self.data), name)
    }

    /// Get a root key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a root key, or `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.data.get(key).unwrap_or(default)
    }

    /// Look up a dotted path such as `network.hostname`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut node = self.data.get(segments.next()?)?;
        for segment in segments {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    /// The whole tree.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The tree as a rendering context value.
    pub fn to_context(&self) -> Value {
        Value::Object(self.data.clone())
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }
}
