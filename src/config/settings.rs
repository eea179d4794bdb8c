//! Settings of the builder itself.
//!
//! Read from an optional `builder.yaml` in the project root. Every field has a
//! default, so an absent file or a partial one is fine. CLI flags are applied
//! on top by the binary.

use crate::error::BuildError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings file name, looked up in the project root.
pub const SETTINGS_FILE: &str = "builder.yaml";

/// Default environment override prefix.
pub const DEFAULT_ENV_PREFIX: &str = "AUTOINSTALL_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSettings {
    /// Directory holding `*.config.yaml` sources (default: `src/config`).
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Prefix stripped from environment overrides; empty accepts every variable.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Directories searched recursively for `build.yaml` descriptors.
    #[serde(default = "default_fragment_dirs")]
    pub fragment_dirs: Vec<PathBuf>,

    /// Template of the primary (autoinstall) artifact.
    #[serde(default = "default_autoinstall_template")]
    pub autoinstall_template: String,

    /// Artifact manifest path.
    #[serde(default = "default_artifacts_file")]
    pub artifacts_file: PathBuf,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            env_prefix: default_env_prefix(),
            fragment_dirs: default_fragment_dirs(),
            autoinstall_template: default_autoinstall_template(),
            artifacts_file: default_artifacts_file(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("src/config")
}

fn default_env_prefix() -> String {
    DEFAULT_ENV_PREFIX.to_string()
}

fn default_fragment_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("book-1-foundation"),
        PathBuf::from("book-2-cloud"),
    ]
}

fn default_autoinstall_template() -> String {
    "book-1-foundation/base/autoinstall.yaml.tpl".to_string()
}

fn default_artifacts_file() -> PathBuf {
    PathBuf::from("output/artifacts.yaml")
}

impl BuildSettings {
    /// Load `builder.yaml` from `project_dir`, or defaults if it is missing.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(SETTINGS_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
        Self::from_yaml(&content).map_err(|e| BuildError::config_parse(SETTINGS_FILE, e).into())
    }

    /// Parse settings text; blank text yields defaults.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Resolve a settings path against the project root.
    pub fn resolve(project_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = BuildSettings::default();
        assert_eq!(settings.config_dir, PathBuf::from("src/config"));
        assert_eq!(settings.env_prefix, "AUTOINSTALL_");
        assert_eq!(settings.fragment_dirs.len(), 2);
        assert_eq!(settings.artifacts_file, PathBuf::from("output/artifacts.yaml"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = BuildSettings::from_yaml("env_prefix: ''\nfragment_dirs: [fragments]\n").unwrap();
        assert_eq!(settings.env_prefix, "");
        assert_eq!(settings.fragment_dirs, vec![PathBuf::from("fragments")]);
        assert_eq!(settings.config_dir, PathBuf::from("src/config"));
    }

    #[test]
    fn test_load_missing_and_present() {
        let temp = TempDir::new().unwrap();
        assert_eq!(BuildSettings::load(temp.path()).unwrap(), BuildSettings::default());

        std::fs::write(temp.path().join(SETTINGS_FILE), "config_dir: conf\n").unwrap();
        let settings = BuildSettings::load(temp.path()).unwrap();
        assert_eq!(settings.config_dir, PathBuf::from("conf"));
    }

    #[test]
    fn test_load_invalid() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SETTINGS_FILE), "fragment_dirs: 3\n").unwrap();
        assert!(BuildSettings::load(temp.path()).is_err());
    }

    #[test]
    fn test_resolve() {
        let root = Path::new("/p");
        assert_eq!(BuildSettings::resolve(root, Path::new("a/b")), PathBuf::from("/p/a/b"));
        assert_eq!(BuildSettings::resolve(root, Path::new("/abs")), PathBuf::from("/abs"));
    }
}
