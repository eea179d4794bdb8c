//! Fragment descriptors.
//!
//! Every `build.yaml` below a fragment root describes one fragment living in
//! that directory:
//!
//! ```text
//! book-1-foundation/base/
//!   build.yaml          name, build_order, build_layer, iso_required
//!   fragment.yaml.tpl   fragment body (optional)
//!   scripts/*.sh.tpl    scripts shared with every template (optional)
//! ```

use crate::error::BuildError;
use anyhow::Result;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const DESCRIPTOR_FILE: &str = "build.yaml";
pub const FRAGMENT_TEMPLATE: &str = "fragment.yaml.tpl";
pub const SCRIPTS_DIR: &str = "scripts";
pub const SCRIPT_SUFFIX: &str = ".sh.tpl";

/// Fields read from `build.yaml`; unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    name: String,
    #[serde(default)]
    build_order: Option<i64>,
    #[serde(default)]
    build_layer: i64,
    #[serde(default, alias = "always_include")]
    iso_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDescriptor {
    /// Identity used by include/exclude filters.
    pub name: String,
    /// Directory holding `build.yaml`.
    pub dir: PathBuf,
    /// Discovery order; `None` sorts after every explicit value.
    pub build_order: Option<i64>,
    /// Compared against the layer ceiling.
    pub build_layer: i64,
    /// Composed regardless of filters into the primary artifact.
    pub always_include: bool,
}

impl FragmentDescriptor {
    /// Parse the `build.yaml` at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let file: DescriptorFile =
            serde_yaml::from_str(&content).map_err(|e| BuildError::descriptor_invalid(path, e))?;
        if file.name.trim().is_empty() {
            return Err(BuildError::descriptor_invalid(path, "name must not be empty").into());
        }

        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            name: file.name,
            dir,
            build_order: file.build_order,
            build_layer: file.build_layer,
            always_include: file.iso_required,
        })
    }

    /// Path of the fragment body template.
    pub fn body_path(&self) -> PathBuf {
        self.dir.join(FRAGMENT_TEMPLATE)
    }

    /// True if the fragment has a body to render.
    pub fn has_body(&self) -> bool {
        self.body_path().is_file()
    }

    /// Script templates in `scripts/`, sorted by file name.
    pub fn script_paths(&self) -> Result<Vec<PathBuf>> {
        let dir = self.dir.join(SCRIPTS_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| BuildError::io(&dir, e))?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(SCRIPT_SUFFIX))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Discover descriptors below each of `roots` (relative to `project_dir`).
///
/// Roots are walked in the given order, each in file-name order. The result
/// is stable-sorted by `build_order`, with unordered descriptors last in
/// discovery order. Missing roots are skipped.
pub fn discover(project_dir: &Path, roots: &[PathBuf]) -> Result<Vec<FragmentDescriptor>> {
    let mut descriptors = Vec::new();

    for root in roots {
        let root = project_dir.join(root);
        if !root.is_dir() {
            debug!(root = %root.display(), "Fragment root not found, skipping");
            continue;
        }

        for entry in WalkDir::new(&root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry.map_err(|e| BuildError::io(&root, e))?;
            if entry.file_type().is_file() && entry.file_name() == DESCRIPTOR_FILE {
                descriptors.push(FragmentDescriptor::from_file(entry.path())?);
            }
        }
    }

    descriptors.sort_by_key(|d| (d.build_order.is_none(), d.build_order));

    let mut seen = HashSet::new();
    for descriptor in &descriptors {
        if !seen.insert(descriptor.name.as_str()) {
            warn!(
                fragment = %descriptor.name,
                dir = %descriptor.dir.display(),
                "Duplicate fragment name; filters will match every copy"
            );
        }
    }

    debug!(count = descriptors.len(), "Discovered fragments");
    Ok(descriptors)
}
