//! CLI command definitions and handlers

pub mod manifest;
pub mod options;
pub mod push;

use clap::{Parser, Subcommand};

/// oras - push and manage OCI artifacts in remote registries
#[derive(Parser)]
#[command(name = "oras")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Push files to a remote registry
    Push(push::PushArgs),

    /// Manage manifests in a remote registry
    Manifest(manifest::ManifestArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_manifest_delete_alias() {
        let cli = Cli::try_parse_from(["oras", "manifest", "rm", "-f", "localhost:5000/hello:v1"]).unwrap();
        match cli.command {
            Commands::Manifest(args) => match args.command {
                manifest::ManifestCommands::Delete(args) => {
                    assert!(args.force);
                    assert_eq!(args.reference, "localhost:5000/hello:v1");
                }
            },
            _ => panic!("expected manifest command"),
        }
    }

    #[test]
    fn test_subject_requires_artifact_type() {
        let result = Cli::try_parse_from(["oras", "push", "localhost:5000/hello:v1", "--subject", "x"]);
        assert!(result.is_err());
    }
}
