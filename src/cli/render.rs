//! Render subcommand.
//!
//! Each target writes one artifact file and records it in the manifest.

use super::Project;
use crate::artifacts::write_artifact;
use crate::compose::{ComposeOptions, FragmentComposer, cloud_config};
use crate::error::BuildError;
use crate::render::template_name;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Arguments for the render subcommand
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(subcommand)]
    pub target: RenderTarget,
}

/// Artifact to render
#[derive(Subcommand, Debug)]
pub enum RenderTarget {
    /// Render a single template (e.g. a script) to a file
    Script(ScriptArgs),

    /// Compose fragments into a cloud-init document
    CloudInit(CloudInitArgs),

    /// Render the autoinstall user-data with the composed cloud-init embedded
    Autoinstall(AutoinstallArgs),
}

#[derive(Args, Debug)]
pub struct ScriptArgs {
    /// Template path relative to the project directory
    #[arg(value_name = "TEMPLATE")]
    pub input: PathBuf,

    /// Output file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

/// Fragment selection flags
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Include only the named fragment (repeatable; see `list-fragments`)
    #[arg(short, long = "include", value_name = "FRAGMENT")]
    pub include: Vec<String>,

    /// Exclude the named fragment (repeatable; wins over --include)
    #[arg(short = 'x', long = "exclude", value_name = "FRAGMENT")]
    pub exclude: Vec<String>,

    /// Include fragments up to this build_layer
    #[arg(short, long, value_name = "LAYER")]
    pub layer: Option<i64>,
}

impl FilterArgs {
    pub fn to_options(&self, for_primary_artifact: bool) -> ComposeOptions {
        let non_empty = |names: &Vec<String>| (!names.is_empty()).then(|| names.clone());
        ComposeOptions {
            include: non_empty(&self.include),
            exclude: non_empty(&self.exclude),
            layer: self.layer,
            for_primary_artifact,
        }
    }
}

#[derive(Args, Debug)]
pub struct CloudInitArgs {
    /// Output file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Args, Debug)]
pub struct AutoinstallArgs {
    /// Output file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Template name for a script argument: project-relative, `/`-separated.
fn script_template(project: &Project, input: &Path) -> Result<String> {
    let name = if input.is_absolute() {
        template_name(&project.dir, input)
    } else {
        template_name(Path::new(""), input)
    };
    name.ok_or_else(|| {
        BuildError::invalid_argument(format!(
            "Template {} is not inside the project directory",
            input.display()
        ))
        .into()
    })
}

/// Run the render subcommand. Returns the path written.
pub fn run_render(project: &Project, args: &RenderArgs) -> Result<PathBuf> {
    let store = project.load_config()?;
    let context = store.to_context();
    let renderer = project.renderer();
    let composer = FragmentComposer::from_settings(&renderer, &project.dir, &project.settings);
    let manifest = project.artifacts_file();

    match &args.target {
        RenderTarget::Script(script) => {
            let template = script_template(project, &script.input)?;
            let text = composer.render_script(&context, &template)?;
            let name = script
                .output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| template.clone());
            write_artifact(&manifest, Some("scripts"), &name, &script.output, &text)?;
            Ok(script.output.clone())
        }
        RenderTarget::CloudInit(cloud) => {
            let document = composer.compose(&context, &cloud.filters.to_options(false))?;
            write_artifact(&manifest, None, "cloud_init", &cloud.output, &cloud_config(&document))?;
            Ok(cloud.output.clone())
        }
        RenderTarget::Autoinstall(auto) => {
            if !auto.filters.include.is_empty() || !auto.filters.exclude.is_empty() {
                warn!("--include/--exclude only apply to the cloud-init target");
            }
            let text = composer.render_autoinstall(
                &context,
                &project.settings.autoinstall_template,
                auto.filters.layer,
            )?;
            write_artifact(&manifest, None, "autoinstall", &auto.output, &text)?;
            Ok(auto.output.clone())
        }
    }
}
