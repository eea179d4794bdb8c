//! Configuration tree resolution.
//!
//! Builds one tree from every `<name>.config.yaml` source, layered in three
//! tiers (lowest to highest priority):
//! 1. **Base** - each source under its own root key, auto-unwrapped
//! 2. **Testing** - sections of `testing.config.yaml` when it sets `testing: true`
//! 3. **Environment** - `AUTOINSTALL_*` variables matched onto tree paths
//!
//! ## Environment overrides
//! `AUTOINSTALL_NETWORK_HOSTNAME=node-1` sets `network.hostname` when that
//! leaf exists. Names are matched against the normalized form of every leaf
//! path (uppercase, non-alphanumerics as `_`); partial matches extend the
//! matched path and unknown names create new nested keys. Values are cast to
//! bool, integer or float where they parse as one.

pub mod index;
pub mod loader;
pub mod merge;
pub mod resolver;
pub mod settings;

pub use index::{PathEntry, PathIndex, normalize_path, path_score};
pub use loader::{CONFIG_SUFFIX, ConfigSource, ConfigStore, ConfigTier, discover_sources, prefixed_vars};
pub use merge::{deep_merge, deep_merge_all};
pub use resolver::{ResolvedPath, cast_value, resolve, set_path};
pub use settings::BuildSettings;
