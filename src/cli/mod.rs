//! CLI command definitions for the builder.
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod artifacts;
pub mod render;

use crate::config::{BuildSettings, ConfigStore};
use crate::render::JinjaRenderer;
use anyhow::Result;
use artifacts::ArtifactsArgs;
use clap::{Parser, Subcommand};
use render::RenderArgs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Build provisioning artifacts from templates
#[derive(Parser, Debug)]
#[command(name = "builder", author, version, about, long_about = None)]
pub struct Cli {
    /// Project root holding fragments and `builder.yaml` (default: current directory)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Configuration directory (overrides builder.yaml; default: src/config)
    #[arg(short, long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Prefix of environment overrides (overrides builder.yaml; default: AUTOINSTALL_)
    #[arg(long, global = true)]
    pub env_prefix: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a script, cloud-init or autoinstall artifact
    Render(RenderArgs),

    /// List fragments in build order
    ListFragments,

    /// Show or update the artifact manifest
    Artifacts(ArtifactsArgs),
}

/// A project directory with its builder settings resolved.
#[derive(Debug, Clone)]
pub struct Project {
    pub dir: PathBuf,
    pub settings: BuildSettings,
}

impl Project {
    /// Load `builder.yaml` and apply CLI overrides on top.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut settings = BuildSettings::load(&cli.project_dir)?;
        if let Some(config_dir) = &cli.config_dir {
            settings.config_dir = config_dir.clone();
        }
        if let Some(prefix) = &cli.env_prefix {
            settings.env_prefix = prefix.clone();
        }
        Ok(Self {
            dir: cli.project_dir.clone(),
            settings,
        })
    }

    pub fn new(dir: impl Into<PathBuf>, settings: BuildSettings) -> Self {
        Self {
            dir: dir.into(),
            settings,
        }
    }

    /// Resolve a settings path against the project directory.
    pub fn path(&self, path: &Path) -> PathBuf {
        BuildSettings::resolve(&self.dir, path)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path(&self.settings.config_dir)
    }

    pub fn artifacts_file(&self) -> PathBuf {
        self.path(&self.settings.artifacts_file)
    }

    /// Build the configuration tree, reading overrides from the environment.
    pub fn load_config(&self) -> Result<ConfigStore> {
        let config_dir = self.config_dir();
        debug!(config_dir = %config_dir.display(), prefix = %self.settings.env_prefix, "Loading configuration");
        ConfigStore::load(&config_dir, &self.settings.env_prefix)
    }

    pub fn renderer(&self) -> JinjaRenderer {
        JinjaRenderer::new(self.dir.clone())
    }
}

/// Run `list-fragments`: fragment names in build order, one per line.
pub fn run_list_fragments(project: &Project) -> Result<Vec<String>> {
    let renderer = project.renderer();
    let composer = crate::compose::FragmentComposer::from_settings(&renderer, &project.dir, &project.settings);
    composer.fragment_names()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_cloud_init() {
        let cli = Cli::try_parse_from([
            "builder", "-v", "render", "cloud-init", "-o", "out.yaml", "-i", "base", "-i", "net",
            "-x", "k8s", "-l", "2",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log, "2");
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        let render::RenderTarget::CloudInit(target) = args.target else {
            panic!("expected cloud-init");
        };
        assert_eq!(target.output, PathBuf::from("out.yaml"));
        assert_eq!(target.filters.include, vec!["base", "net"]);
        assert_eq!(target.filters.exclude, vec!["k8s"]);
        assert_eq!(target.filters.layer, Some(2));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "builder", "list-fragments", "--config-dir", "conf", "--env-prefix", "X_",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::ListFragments));
        assert_eq!(cli.config_dir, Some(PathBuf::from("conf")));
        assert_eq!(cli.env_prefix.as_deref(), Some("X_"));
    }

    #[test]
    fn test_project_overrides() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "builder", "-C", dir.as_str(), "--env-prefix", "", "list-fragments",
        ])
        .unwrap();
        let project = Project::from_cli(&cli).unwrap();
        assert_eq!(project.settings.env_prefix, "");
        assert_eq!(project.config_dir(), temp.path().join("src/config"));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["builder"]).is_err());
    }
}
