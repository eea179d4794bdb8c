//! Fragment composition.
//!
//! Discovers fragment descriptors, filters them, renders each body against the
//! configuration tree and deep-merges the parsed results in build order into
//! one document. Descriptors are discovered again on every call.

pub mod descriptor;

use crate::config::deep_merge;
use crate::config::settings::BuildSettings;
use crate::error::BuildError;
use crate::render::{TemplateRenderer, extend_context, template_name};
use crate::yaml;
use anyhow::Result;
use descriptor::FragmentDescriptor;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use descriptor::discover;

/// Context key under which pre-rendered scripts are exposed to templates.
pub const SCRIPTS_KEY: &str = "scripts";

/// Context key under which the composed document is exposed to the primary
/// artifact template.
pub const CLOUD_INIT_KEY: &str = "cloud_init";

/// First line of a cloud-init document.
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";

/// Fragment selection for one composition.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// Allow-list of fragment names.
    pub include: Option<Vec<String>>,
    /// Deny-list of fragment names, applied after `include`.
    pub exclude: Option<Vec<String>>,
    /// Inclusive upper bound on `build_layer`.
    pub layer: Option<i64>,
    /// Always-include fragments bypass every filter when set.
    pub for_primary_artifact: bool,
}

/// Why a fragment was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoBody,
    NotIncluded,
    Excluded,
    AboveLayer,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoBody => write!(f, "no fragment body"),
            SkipReason::NotIncluded => write!(f, "not in include list"),
            SkipReason::Excluded => write!(f, "in exclude list"),
            SkipReason::AboveLayer => write!(f, "above layer ceiling"),
        }
    }
}

impl ComposeOptions {
    /// Apply the filters to a descriptor. `None` means it is composed.
    pub fn filter(&self, descriptor: &FragmentDescriptor) -> Option<SkipReason> {
        if self.for_primary_artifact && descriptor.always_include {
            return None;
        }
        let name = &descriptor.name;
        if let Some(include) = &self.include
            && !include.contains(name)
        {
            return Some(SkipReason::NotIncluded);
        }
        if let Some(exclude) = &self.exclude
            && exclude.contains(name)
        {
            return Some(SkipReason::Excluded);
        }
        if let Some(layer) = self.layer
            && descriptor.build_layer > layer
        {
            return Some(SkipReason::AboveLayer);
        }
        None
    }
}

/// Composes fragments found under the configured roots of a project.
pub struct FragmentComposer<'a, R: TemplateRenderer + ?Sized> {
    renderer: &'a R,
    project_dir: PathBuf,
    fragment_dirs: Vec<PathBuf>,
}

impl<'a, R: TemplateRenderer + ?Sized> FragmentComposer<'a, R> {
    /// `fragment_dirs` are relative to `project_dir`, which must also be the
    /// renderer's template root.
    pub fn new(renderer: &'a R, project_dir: impl Into<PathBuf>, fragment_dirs: Vec<PathBuf>) -> Self {
        Self {
            renderer,
            project_dir: project_dir.into(),
            fragment_dirs,
        }
    }

    pub fn from_settings(renderer: &'a R, project_dir: impl Into<PathBuf>, settings: &BuildSettings) -> Self {
        Self::new(renderer, project_dir, settings.fragment_dirs.clone())
    }

    /// Discover descriptors in build order.
    pub fn descriptors(&self) -> Result<Vec<FragmentDescriptor>> {
        discover(&self.project_dir, &self.fragment_dirs)
    }

    /// Names of all discovered fragments in build order.
    pub fn fragment_names(&self) -> Result<Vec<String>> {
        Ok(self.descriptors()?.into_iter().map(|d| d.name).collect())
    }

    fn template_for(&self, path: &Path) -> Result<String> {
        template_name(&self.project_dir, path).ok_or_else(|| {
            BuildError::invalid_argument(format!(
                "{} is outside the project directory {}",
                path.display(),
                self.project_dir.display()
            ))
            .into()
        })
    }

    /// Render one template (a path relative to the project root).
    pub fn render_script(&self, context: &Value, template: &str) -> Result<String> {
        self.renderer.render(template, context)
    }

    /// Render every `scripts/*.sh.tpl` of every fragment.
    ///
    /// Keys are file names without `.tpl`; a later fragment's script replaces
    /// an earlier one of the same name.
    pub fn render_scripts(&self, context: &Value) -> Result<Map<String, Value>> {
        let mut scripts = Map::new();
        for descriptor in self.descriptors()? {
            for path in descriptor.script_paths()? {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let key = file_name
                    .strip_suffix(".tpl")
                    .unwrap_or(file_name)
                    .to_string();
                let template = self.template_for(&path)?;
                let rendered = self.renderer.render(&template, context)?;
                debug!(fragment = %descriptor.name, script = %key, "Rendered script");
                scripts.insert(key, Value::String(rendered));
            }
        }
        Ok(scripts)
    }

    /// Render scripts, then compose fragments with them in context.
    pub fn compose(&self, context: &Value, options: &ComposeOptions) -> Result<Value> {
        let scripts = self.render_scripts(context)?;
        self.compose_with_scripts(context, &scripts, options)
    }

    /// Compose fragments with already rendered scripts.
    ///
    /// Stops at the first fragment whose output is not valid YAML; nothing
    /// merged so far is returned in that case.
    pub fn compose_with_scripts(
        &self,
        context: &Value,
        scripts: &Map<String, Value>,
        options: &ComposeOptions,
    ) -> Result<Value> {
        let ctx = extend_context(context, [(SCRIPTS_KEY, Value::Object(scripts.clone()))]);
        let mut merged = Value::Object(Map::new());
        let mut composed = 0usize;

        for descriptor in self.descriptors()? {
            let reason = if descriptor.has_body() {
                options.filter(&descriptor)
            } else {
                Some(SkipReason::NoBody)
            };
            if let Some(reason) = reason {
                debug!(fragment = %descriptor.name, %reason, "Skipping fragment");
                continue;
            }

            let template = self.template_for(&descriptor.body_path())?;
            let rendered = self.renderer.render(&template, &ctx)?;
            let fragment = yaml::parse_document(&rendered)
                .map_err(|e| BuildError::fragment_invalid(&descriptor.name, e, &rendered))?;

            if yaml::is_empty_document(&fragment) {
                debug!(fragment = %descriptor.name, "Fragment rendered empty");
                continue;
            }

            merged = deep_merge(merged, fragment);
            composed += 1;
            debug!(
                fragment = %descriptor.name,
                build_layer = descriptor.build_layer,
                "Composed fragment"
            );
        }

        info!(fragments = composed, "Composition complete");
        Ok(merged)
    }

    /// Composed document as cloud-init user data.
    pub fn render_cloud_init(&self, context: &Value, options: &ComposeOptions) -> Result<String> {
        let document = self.compose(context, options)?;
        Ok(cloud_config(&document))
    }

    /// Render the primary artifact template.
    ///
    /// The template sees the tree plus `scripts` and `cloud_init`, the latter
    /// composed for the primary artifact up to `layer`.
    pub fn render_autoinstall(&self, context: &Value, template: &str, layer: Option<i64>) -> Result<String> {
        let scripts = self.render_scripts(context)?;
        let options = ComposeOptions {
            layer,
            for_primary_artifact: true,
            ..ComposeOptions::default()
        };
        let cloud_init = self.compose_with_scripts(context, &scripts, &options)?;
        let ctx = extend_context(
            context,
            [
                (SCRIPTS_KEY, Value::Object(scripts)),
                (CLOUD_INIT_KEY, cloud_init),
            ],
        );
        self.renderer.render(template, &ctx)
    }
}

/// Serialize a document with the cloud-config header.
pub fn cloud_config(document: &Value) -> String {
    format!("{}{}", CLOUD_CONFIG_HEADER, yaml::to_string(document))
}
