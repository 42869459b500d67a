//! Push configuration assembled from option mutators

use crate::content::descriptor::Descriptor;
use crate::content::handler::{Handler, NameValidator};
use crate::content::status::StatusTracker;
use crate::content::validate::validate_name_as_path;
use crate::push::artifact::ArtifactManifest;
use crate::Result;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Configuration of a single push
///
/// Built by applying [`PushOpt`]s to the defaults and consumed by one push.
pub struct PushOpts {
    pub config: Option<Descriptor>,
    pub config_media_type: Option<String>,
    pub config_annotations: Option<HashMap<String, String>>,
    pub manifest: Option<Descriptor>,
    pub manifest_annotations: Option<HashMap<String, String>>,
    pub manifest_writer: Option<Box<dyn Write + Send>>,
    /// `None` disables name validation
    pub validate_name: Option<NameValidator>,
    /// Run before the push handlers, in registration order
    pub base_handlers: Vec<Arc<dyn Handler>>,
    pub artifact: Option<ArtifactManifest>,
}

impl Default for PushOpts {
    fn default() -> Self {
        Self {
            config: None,
            config_media_type: None,
            config_annotations: None,
            manifest: None,
            manifest_annotations: None,
            manifest_writer: None,
            validate_name: Some(Arc::new(|desc: &Descriptor| -> Result<()> {
                Ok(validate_name_as_path(desc)?)
            })),
            base_handlers: Vec::new(),
            artifact: None,
        }
    }
}

impl PushOpts {
    /// Apply `opts` to the defaults in order, stopping at the first error
    pub fn with_options(opts: impl IntoIterator<Item = PushOpt>) -> Result<Self> {
        let mut config = Self::default();
        for opt in opts {
            opt(&mut config)?;
        }
        Ok(config)
    }
}

/// Mutator applied to [`PushOpts`]
pub type PushOpt = Box<dyn FnOnce(&mut PushOpts) -> Result<()> + Send>;

/// Override the config; the config media type and annotations are then ignored
pub fn with_config(config: Descriptor) -> PushOpt {
    Box::new(move |o| {
        o.config = Some(config);
        Ok(())
    })
}

pub fn with_config_media_type(media_type: impl Into<String>) -> PushOpt {
    let media_type = media_type.into();
    Box::new(move |o| {
        o.config_media_type = Some(media_type);
        Ok(())
    })
}

pub fn with_config_annotations(annotations: HashMap<String, String>) -> PushOpt {
    Box::new(move |o| {
        o.config_annotations = Some(annotations);
        Ok(())
    })
}

/// Override the manifest; the manifest annotations are then ignored
pub fn with_manifest(manifest: Descriptor) -> PushOpt {
    Box::new(move |o| {
        o.manifest = Some(manifest);
        Ok(())
    })
}

pub fn with_manifest_annotations(annotations: HashMap<String, String>) -> PushOpt {
    Box::new(move |o| {
        o.manifest_annotations = Some(annotations);
        Ok(())
    })
}

/// Write the generated manifest to `writer`
pub fn with_manifest_writer(writer: impl Write + Send + 'static) -> PushOpt {
    Box::new(move |o| {
        o.manifest_writer = Some(Box::new(writer));
        Ok(())
    })
}

/// Replace the name validator; `None` disables validation
pub fn with_name_validation(validate: Option<NameValidator>) -> PushOpt {
    Box::new(move |o| {
        o.validate_name = validate;
        Ok(())
    })
}

/// Add handlers that run before the push handlers
pub fn with_push_base_handler(handlers: Vec<Arc<dyn Handler>>) -> PushOpt {
    Box::new(move |o| {
        o.base_handlers.extend(handlers);
        Ok(())
    })
}

/// Report each named upload to `writer`
pub fn with_push_status_track(writer: impl Write + Send + 'static) -> PushOpt {
    with_push_base_handler(vec![Arc::new(StatusTracker::new(writer)) as Arc<dyn Handler>])
}

/// Push the content as an artifact of `artifact_type` referring to `subject`
pub fn as_artifact(artifact_type: impl Into<String>, subject: Descriptor) -> PushOpt {
    let artifact_type = artifact_type.into();
    Box::new(move |o| {
        o.artifact = Some(ArtifactManifest::new(artifact_type, &subject));
        Ok(())
    })
}
