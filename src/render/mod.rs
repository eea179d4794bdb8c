//! Template rendering.
//!
//! Composition only needs `render(template, context) -> text`, expressed by
//! [`TemplateRenderer`]. [`JinjaRenderer`] implements it with minijinja,
//! loading templates by path relative to the project root.

pub mod filters;

use crate::error::BuildError;
use anyhow::Result;
use minijinja::{AutoEscape, Environment, ErrorKind};
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Renders a named template against a context mapping.
pub trait TemplateRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String>;
}

/// minijinja-backed renderer rooted at a project directory.
///
/// Template names are `/`-separated paths relative to the root, e.g.
/// `book-1-foundation/base/fragment.yaml.tpl`. Trailing newlines are kept so
/// rendered scripts stay byte-identical to their templates.
pub struct JinjaRenderer {
    env: Environment<'static>,
    root: PathBuf,
}

impl JinjaRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(root.clone()));
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        filters::register(&mut env);
        Self { env, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Render template source text directly, without the loader.
    pub fn render_str(&self, source: &str, context: &Value) -> Result<String> {
        self.env
            .render_str(source, context)
            .map_err(|e| BuildError::template("<inline>", describe(&e)).into())
    }
}

impl TemplateRenderer for JinjaRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String> {
        debug!(template, "Rendering template");
        let tmpl = self.env.get_template(template).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => BuildError::template_not_found(template),
            _ => BuildError::template(template, describe(&e)),
        })?;
        let text = tmpl
            .render(context)
            .map_err(|e| BuildError::template(template, describe(&e)))?;
        Ok(text)
    }
}

/// Engine error text including the template line, when known.
fn describe(err: &minijinja::Error) -> String {
    match (err.name(), err.line()) {
        (Some(name), Some(line)) => format!("{} ({}:{})", err, name, line),
        _ => err.to_string(),
    }
}

/// Copy of `base` (a mapping) with `extra` entries added at the root.
///
/// A non-mapping `base` contributes nothing.
pub fn extend_context<'a>(base: &Value, extra: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    let mut map = match base {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in extra {
        map.insert(key.to_string(), value);
    }
    Value::Object(map)
}

/// Template name for `path` relative to `root`, with `/` separators.
pub fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .map(|component| component.as_os_str().to_str())
        .collect();
    Some(parts?.join("/"))
}
