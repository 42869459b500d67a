//! `oras manifest` command implementations

use crate::cli::options::RemoteArgs;
use crate::manifest::{delete_manifest, DeleteOptions, Prompter};
use clap::{Args, Subcommand};

/// Arguments for the `manifest` command
#[derive(Args)]
pub struct ManifestArgs {
    #[command(subcommand)]
    pub command: ManifestCommands,
}

#[derive(Subcommand)]
pub enum ManifestCommands {
    /// Delete a manifest from remote registry
    #[command(visible_aliases = ["remove", "rm"])]
    Delete(DeleteArgs),
}

/// Arguments for the `manifest delete` command
#[derive(Args)]
#[command(after_help = "Example - Delete a manifest tagged with 'v1' from repository 'localhost:5000/hello':
  oras manifest delete localhost:5000/hello:v1

Example - Delete a manifest without prompting confirmation:
  oras manifest delete --force localhost:5000/hello:v1

Example - Delete a manifest and print its descriptor:
  oras manifest delete --descriptor localhost:5000/hello:v1")]
pub struct DeleteArgs {
    /// Manifest to delete: <name>{:<tag>|@<digest>}
    pub reference: String,

    /// Ignore nonexistent references, never prompt
    #[arg(short, long)]
    pub force: bool,

    /// Print the descriptor of the deleted manifest
    #[arg(long)]
    pub descriptor: bool,

    /// Prettify JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

/// Execute the `manifest` command
pub async fn execute(args: ManifestArgs) -> anyhow::Result<()> {
    match args.command {
        ManifestCommands::Delete(args) => execute_delete(args).await,
    }
}

/// Execute the `manifest delete` command
pub async fn execute_delete(args: DeleteArgs) -> anyhow::Result<()> {
    let opts = DeleteOptions {
        target_ref: args.reference.clone(),
        force: args.force,
        output_descriptor: args.descriptor,
        pretty: args.pretty,
        referrers_api: args.remote.referrers_api(),
    };
    opts.validate()?;

    let repository = args.remote.repository(&args.reference)?;

    let stdin = std::io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), std::io::stderr());
    let mut stdout = std::io::stdout();

    delete_manifest(&repository, &opts, &mut prompter, &mut stdout).await?;

    Ok(())
}
