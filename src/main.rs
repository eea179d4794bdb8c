//! Provisioning artifact builder
//!
//! Renders shell scripts, cloud-init user data and autoinstall manifests from
//! layered YAML configuration and template fragments.

use anyhow::Result;
use clap::Parser;
use provision_builder::cli::artifacts::run_artifacts;
use provision_builder::cli::render::run_render;
use provision_builder::cli::{Cli, Command, Project, run_list_fragments};
use provision_builder::error::BuildError;
use provision_builder::logging::{self, LogTarget};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let project = Project::from_cli(&cli)?;

    match &cli.command {
        Command::Render(args) => {
            let output = run_render(&project, args)?;
            println!("Generated: {}", output.display());
        }
        Command::ListFragments => {
            let names = run_list_fragments(&project)?;
            if names.is_empty() {
                let roots: Vec<String> = project
                    .settings
                    .fragment_dirs
                    .iter()
                    .map(|dir| dir.display().to_string())
                    .collect();
                return Err(BuildError::invalid_argument(format!(
                    "No fragments found in {}",
                    roots.join(", ")
                ))
                .into());
            }
            println!("Available fragments:");
            for name in names {
                println!("  {}", name);
            }
        }
        Command::Artifacts(args) => {
            println!("{}", run_artifacts(&project, args)?);
        }
    }

    Ok(())
}
