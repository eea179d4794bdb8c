//! Artifacts subcommand for the builder CLI
//!
//! Shows or edits the artifact manifest, e.g. to record an ISO path produced
//! by a later build stage.

use super::Project;
use crate::artifacts::{ArtifactManifest, parse_key, update};
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Arguments for the artifacts subcommand
#[derive(Args, Debug)]
pub struct ArtifactsArgs {
    #[command(subcommand)]
    pub action: ArtifactsAction,
}

#[derive(Subcommand, Debug)]
pub enum ArtifactsAction {
    /// Print the manifest
    Show {
        /// Manifest file (default: artifacts_file from builder.yaml)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Record an artifact path
    Set {
        /// Artifact name, or `category:name` (e.g. "iso", "scripts:early-net.sh")
        name: String,

        /// Artifact value (typically a path)
        value: String,

        /// Manifest file (default: artifacts_file from builder.yaml)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

fn manifest_path(project: &Project, file: &Option<PathBuf>) -> PathBuf {
    match file {
        Some(file) => file.clone(),
        None => project.artifacts_file(),
    }
}

/// Run the artifacts subcommand. Returns the text to print.
pub fn run_artifacts(project: &Project, args: &ArtifactsArgs) -> Result<String> {
    match &args.action {
        ArtifactsAction::Show { file } => {
            let manifest = ArtifactManifest::load(&manifest_path(project, file))?;
            if manifest.is_empty() {
                Ok("No artifacts found".to_string())
            } else {
                Ok(manifest.to_yaml())
            }
        }
        ArtifactsAction::Set { name, value, file } => {
            let (category, key) = parse_key(name);
            update(&manifest_path(project, file), category, key, value)?;
            Ok(format!("Updated: {} = {}", name, value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSettings;
    use tempfile::TempDir;

    #[test]
    fn test_show_empty_then_set() {
        let temp = TempDir::new().unwrap();
        let project = Project::new(temp.path(), BuildSettings::default());

        let show = ArtifactsArgs {
            action: ArtifactsAction::Show { file: None },
        };
        assert_eq!(run_artifacts(&project, &show).unwrap(), "No artifacts found");

        let set = ArtifactsArgs {
            action: ArtifactsAction::Set {
                name: "scripts:early-net.sh".into(),
                value: "output/early-net.sh".into(),
                file: None,
            },
        };
        assert_eq!(
            run_artifacts(&project, &set).unwrap(),
            "Updated: scripts:early-net.sh = output/early-net.sh"
        );
        assert!(temp.path().join("output/artifacts.yaml").is_file());

        let shown = run_artifacts(&project, &show).unwrap();
        assert!(shown.starts_with("scripts:\n  early-net.sh: output/early-net.sh\nbuild_timestamp: "));
    }
}
