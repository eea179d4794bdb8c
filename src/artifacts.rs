//! Artifact manifest.
//!
//! A YAML mapping recording where each generated artifact was written, either
//! at the top level (`cloud_init: output/cloud-init.yaml`) or grouped under a
//! category (`scripts: {early-net.sh: output/early-net.sh}`). Every save
//! stamps `build_timestamp`.

use crate::error::BuildError;
use crate::yaml;
use anyhow::Result;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const TIMESTAMP_KEY: &str = "build_timestamp";

/// Split `category:name` into its parts; a bare name has no category.
pub fn parse_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once(':') {
        Some((category, name)) => (Some(category), name),
        None => (None, key),
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactManifest {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl ArtifactManifest {
    /// Load the manifest at `path`; a missing or empty file gives an empty one.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.is_file() {
            let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
            let label = path.display().to_string();
            match yaml::parse_document(&content).map_err(|e| BuildError::config_parse(&label, e))? {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                _ => {
                    return Err(BuildError::config_parse(&label, "manifest is not a mapping").into());
                }
            }
        } else {
            Map::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, category: Option<&str>, name: &str) -> Option<&Value> {
        match category {
            Some(category) => self.entries.get(category)?.get(name),
            None => self.entries.get(name),
        }
    }

    /// Record an entry, creating the category mapping if needed.
    pub fn set(&mut self, category: Option<&str>, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let Some(category) = category else {
            self.entries.insert(name.to_string(), value);
            return;
        };

        let slot = self
            .entries
            .entry(category.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            warn!(category, "Replacing non-mapping manifest entry with a category");
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            map.insert(name.to_string(), value);
        }
    }

    /// Stamp `build_timestamp` and write the manifest.
    pub fn save(&mut self) -> Result<()> {
        self.entries.insert(
            TIMESTAMP_KEY.to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        std::fs::write(&self.path, self.to_yaml()).map_err(|e| BuildError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "Saved artifact manifest");
        Ok(())
    }

    pub fn to_yaml(&self) -> String {
        yaml::to_string(&Value::Object(self.entries.clone()))
    }
}

/// Load, set one entry, and save.
pub fn update(manifest_path: &Path, category: Option<&str>, name: &str, value: &str) -> Result<ArtifactManifest> {
    let mut manifest = ArtifactManifest::load(manifest_path)?;
    manifest.set(category, name, value);
    manifest.save()?;
    Ok(manifest)
}

/// Write an artifact file and record it in the manifest.
pub fn write_artifact(
    manifest_path: &Path,
    category: Option<&str>,
    name: &str,
    output: &Path,
    content: &str,
) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    std::fs::write(output, content).map_err(|e| BuildError::io(output, e))?;
    info!(artifact = name, path = %output.display(), "Wrote artifact");
    update(manifest_path, category, name, &output.display().to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("iso"), (None, "iso"));
        assert_eq!(parse_key("scripts:early-net.sh"), (Some("scripts"), "early-net.sh"));
        assert_eq!(parse_key("a:b:c"), (Some("a"), "b:c"));
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let manifest = ArtifactManifest::load(&temp.path().join("artifacts.yaml")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_update_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("output/artifacts.yaml");

        update(&path, None, "iso", "output/ubuntu.iso").unwrap();
        update(&path, Some("scripts"), "early-net.sh", "output/early-net.sh").unwrap();

        let manifest = ArtifactManifest::load(&path).unwrap();
        assert_eq!(manifest.get(None, "iso"), Some(&json!("output/ubuntu.iso")));
        assert_eq!(
            manifest.get(Some("scripts"), "early-net.sh"),
            Some(&json!("output/early-net.sh"))
        );
        let stamp = manifest.get(None, TIMESTAMP_KEY).and_then(Value::as_str).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_set_replaces_scalar_category() {
        let temp = TempDir::new().unwrap();
        let mut manifest = ArtifactManifest::load(&temp.path().join("a.yaml")).unwrap();
        manifest.set(None, "scripts", "oops");
        manifest.set(Some("scripts"), "x.sh", "out/x.sh");
        assert_eq!(manifest.entries()["scripts"], json!({"x.sh": "out/x.sh"}));
    }

    #[test]
    fn test_write_artifact() {
        let temp = TempDir::new().unwrap();
        let manifest_path = temp.path().join("artifacts.yaml");
        let output = temp.path().join("out/cloud-init.yaml");

        write_artifact(&manifest_path, None, "cloud_init", &output, "#cloud-config\n{}\n").unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "#cloud-config\n{}\n");
        let manifest = ArtifactManifest::load(&manifest_path).unwrap();
        assert_eq!(
            manifest.get(None, "cloud_init"),
            Some(&json!(output.display().to_string()))
        );
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artifacts.yaml");
        std::fs::write(&path, "- a\n- b\n").unwrap();
        assert!(ArtifactManifest::load(&path).is_err());
    }
}
