//! Pushing files to a registry as an image or artifact manifest

pub mod artifact;
pub mod options;

pub use artifact::{ArtifactDescriptor, ArtifactManifest};
pub use options::{
    as_artifact, with_config, with_config_annotations, with_config_media_type, with_manifest,
    with_manifest_annotations, with_manifest_writer, with_name_validation, with_push_base_handler,
    with_push_status_track, PushOpt, PushOpts,
};

use crate::content::descriptor::{media_types, Descriptor, ImageManifest};
use crate::content::handler::{dispatch, Handler, Handlers, NameValidation};
use crate::content::memory::MemoryStore;
use crate::registry::Target;
use crate::{OrasError, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::HashSet;
use std::io::Write;

/// Content of the config blob generated when none is supplied
const EMPTY_CONFIG: &[u8] = b"{}";

/// Push `files` held in `provider` to `target`
///
/// Builds the manifest according to `opts`, runs every reachable
/// descriptor through the handler chain, uploads whatever the target is
/// missing (blobs before the manifests referencing them) and finally tags
/// the manifest when `tag` is given. Returns the manifest descriptor.
pub async fn push(
    target: &dyn Target,
    tag: Option<&str>,
    provider: &MemoryStore,
    files: &[Descriptor],
    opts: impl IntoIterator<Item = PushOpt>,
) -> Result<Descriptor> {
    let mut opts = PushOpts::with_options(opts)?;
    let root = pack(provider, files, &mut opts)?;

    let handler = PushHandler {
        base: opts.base_handlers.into_iter().collect(),
        validate: opts.validate_name.map(|v| NameValidation::new(v, files)),
        provider,
    };
    let order = dispatch(&handler, std::slice::from_ref(&root)).await?;

    // files sharing content are walked once per name but uploaded once
    let mut uploaded = HashSet::new();
    let (manifests, blobs): (Vec<_>, Vec<_>) = order
        .into_iter()
        .filter(|d| uploaded.insert(d.digest.clone()))
        .partition(|d| media_types::is_manifest(&d.media_type));

    try_join_all(blobs.iter().map(|desc| upload(target, provider, desc))).await?;
    for desc in &manifests {
        upload(target, provider, desc).await?;
    }

    if let Some(tag) = tag {
        target.tag(&root, provider.fetch(&root)?, tag).await?;
        tracing::info!("tagged {} as {}", root.digest, tag);
    }

    Ok(root)
}

async fn upload(target: &dyn Target, provider: &MemoryStore, desc: &Descriptor) -> Result<()> {
    if target.exists(desc).await? {
        tracing::debug!("{} already exists", desc.digest);
        return Ok(());
    }
    target.push(desc, provider.fetch(desc)?).await
}

/// Build the root manifest for a push and store it in `store`
///
/// An explicit manifest wins, then an artifact manifest, then an image
/// manifest over the config blob.
pub fn pack(store: &MemoryStore, files: &[Descriptor], opts: &mut PushOpts) -> Result<Descriptor> {
    if let Some(manifest) = &opts.manifest {
        if !store.contains(&manifest.digest) {
            return Err(OrasError::NotFound(manifest.digest.to_string()));
        }
        return Ok(manifest.clone());
    }

    let (media_type, content) = match opts.artifact.take() {
        Some(mut artifact) => {
            artifact.blobs = files.iter().map(ArtifactDescriptor::from).collect();
            artifact.annotations = opts.manifest_annotations.clone();
            (media_types::ARTIFACT_MANIFEST, serde_json::to_vec(&artifact)?)
        }
        None => {
            let config = match &opts.config {
                Some(config) => config.clone(),
                None => {
                    let media_type = opts
                        .config_media_type
                        .as_deref()
                        .unwrap_or(media_types::UNKNOWN_CONFIG);
                    let mut config = Descriptor::from_bytes(media_type, EMPTY_CONFIG);
                    config.annotations = opts.config_annotations.clone();
                    store.set(config.clone(), EMPTY_CONFIG.to_vec());
                    config
                }
            };

            let manifest = ImageManifest {
                schema_version: 2,
                media_type: Some(media_types::OCI_IMAGE_MANIFEST.to_string()),
                config,
                layers: files.to_vec(),
                annotations: opts.manifest_annotations.clone(),
            };
            (media_types::OCI_IMAGE_MANIFEST, serde_json::to_vec(&manifest)?)
        }
    };

    if let Some(writer) = opts.manifest_writer.as_mut() {
        writer.write_all(&content)?;
        writer.flush()?;
    }

    Ok(store.add(media_type, content, None))
}

/// Handler chain of a push: caller handlers, name validation, then
/// expansion of manifests into the blobs they reference
struct PushHandler<'a> {
    base: Handlers,
    validate: Option<NameValidation>,
    provider: &'a MemoryStore,
}

#[async_trait]
impl<'a> Handler for PushHandler<'a> {
    async fn handle(&self, desc: &Descriptor) -> Result<Vec<Descriptor>> {
        let mut children = self.base.handle(desc).await?;
        if let Some(validate) = &self.validate {
            children.extend(validate.handle(desc).await?);
        }
        children.extend(manifest_children(self.provider, desc)?);
        Ok(children)
    }
}

/// Blobs referenced by a manifest; the subject of an artifact is not
/// part of the push
fn manifest_children(provider: &MemoryStore, desc: &Descriptor) -> Result<Vec<Descriptor>> {
    match desc.media_type.as_str() {
        media_types::OCI_IMAGE_MANIFEST | media_types::DOCKER_MANIFEST_V2 => {
            let manifest: ImageManifest = serde_json::from_slice(&provider.fetch(desc)?)?;
            let mut children = vec![manifest.config];
            children.extend(manifest.layers);
            Ok(children)
        }
        media_types::ARTIFACT_MANIFEST => {
            let manifest: ArtifactManifest = serde_json::from_slice(&provider.fetch(desc)?)?;
            Ok(manifest.blobs.iter().map(Descriptor::from).collect())
        }
        _ => Ok(Vec::new()),
    }
}
