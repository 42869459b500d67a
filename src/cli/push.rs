//! `oras push` command implementation

use crate::cli::options::RemoteArgs;
use crate::content::descriptor::media_types;
use crate::content::memory::MemoryStore;
use crate::push::{self, PushOpt};
use crate::registry::ManifestStore;
use crate::OrasError;
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;

/// Arguments for the `push` command
#[derive(Args)]
pub struct PushArgs {
    /// Destination: <name>[:<tag>|@<digest>]
    pub reference: String,

    /// Files to push, as <file>[:<type>]
    pub files: Vec<String>,

    /// Config file, as <file>[:<type>]
    #[arg(long)]
    pub config: Option<String>,

    /// Media type of the generated config
    #[arg(long, conflicts_with = "config")]
    pub config_media_type: Option<String>,

    /// Manifest annotations, as <key>=<value>
    #[arg(short, long = "annotation")]
    pub annotations: Vec<String>,

    /// Push as an artifact of this type
    #[arg(long, requires = "subject")]
    pub artifact_type: Option<String>,

    /// Manifest the artifact refers to
    #[arg(long, requires = "artifact_type")]
    pub subject: Option<String>,

    /// Write the pushed manifest to a file
    #[arg(long)]
    pub export_manifest: Option<PathBuf>,

    /// Accept any file name, not only clean relative paths
    #[arg(long)]
    pub disable_path_validation: bool,

    /// Suppress upload progress
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

/// Execute the `push` command
pub async fn execute(args: PushArgs) -> anyhow::Result<()> {
    let repository = args.remote.repository(&args.reference)?;
    let reference = repository.reference().clone();
    let provider = MemoryStore::new();

    let mut files = Vec::new();
    for entry in &args.files {
        let (path, media_type) = split_media_type(entry, media_types::OCI_LAYER_TAR);
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path, e))?;
        files.push(provider.add(media_type, data, Some(path)));
    }

    let mut opts: Vec<PushOpt> = Vec::new();

    if let Some(config) = &args.config {
        let (path, media_type) = split_media_type(config, media_types::UNKNOWN_CONFIG);
        let data = tokio::fs::read(path).await?;
        opts.push(push::with_config(provider.add(media_type, data, None)));
    } else if let Some(media_type) = &args.config_media_type {
        opts.push(push::with_config_media_type(media_type.clone()));
    }

    if !args.annotations.is_empty() {
        opts.push(push::with_manifest_annotations(parse_annotations(&args.annotations)?));
    }
    if let Some(path) = &args.export_manifest {
        opts.push(push::with_manifest_writer(std::fs::File::create(path)?));
    }
    if args.disable_path_validation {
        opts.push(push::with_name_validation(None));
    }
    if !args.quiet {
        opts.push(push::with_push_status_track(std::io::stdout()));
    }

    if let (Some(artifact_type), Some(subject)) = (&args.artifact_type, &args.subject) {
        let subject = repository.resolve(subject).await?;
        opts.push(push::as_artifact(artifact_type.clone(), subject));
    }

    let tag = Some(reference.reference.as_str()).filter(|r| !r.is_empty() && !reference.is_digest());
    let root = push::push(&repository, tag, &provider, &files, opts).await?;

    println!("Pushed {}", reference);
    println!("Digest: {}", root.digest);

    Ok(())
}

/// Split `<path>[:<type>]`; a media type always contains a slash
fn split_media_type<'a>(entry: &'a str, default: &'a str) -> (&'a str, &'a str) {
    match entry.rsplit_once(':') {
        Some((path, media_type)) if !path.is_empty() && media_type.contains('/') => (path, media_type),
        _ => (entry, default),
    }
}

fn parse_annotations(raw: &[String]) -> crate::Result<HashMap<String, String>> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| OrasError::Configuration(format!("invalid annotation: {}", entry)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_media_type() {
        assert_eq!(
            split_media_type("hello.txt", media_types::OCI_LAYER_TAR),
            ("hello.txt", media_types::OCI_LAYER_TAR)
        );
        assert_eq!(
            split_media_type("sbom.json:application/spdx+json", media_types::OCI_LAYER_TAR),
            ("sbom.json", "application/spdx+json")
        );
        assert_eq!(
            split_media_type("C:/a.txt", media_types::OCI_LAYER_TAR),
            ("C:/a.txt", media_types::OCI_LAYER_TAR)
        );
    }

    #[test]
    fn test_parse_annotations() {
        let parsed = parse_annotations(&["a=1".to_string(), "b=x=y".to_string()]).unwrap();
        assert_eq!(parsed["a"], "1");
        assert_eq!(parsed["b"], "x=y");

        assert!(parse_annotations(&["novalue".to_string()]).is_err());
        assert!(parse_annotations(&["=v".to_string()]).is_err());
    }
}
