//! ORAS artifact manifest

use crate::content::descriptor::{media_types, Descriptor, Digest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptor as represented inside an artifact manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub media_type: String,
    pub digest: Digest,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl From<&Descriptor> for ArtifactDescriptor {
    fn from(desc: &Descriptor) -> Self {
        Self {
            media_type: desc.media_type.clone(),
            digest: desc.digest.clone(),
            size: desc.size,
            annotations: desc.annotations.clone(),
        }
    }
}

impl From<&ArtifactDescriptor> for Descriptor {
    fn from(desc: &ArtifactDescriptor) -> Self {
        Self {
            media_type: desc.media_type.clone(),
            digest: desc.digest.clone(),
            size: desc.size,
            annotations: desc.annotations.clone(),
        }
    }
}

/// Manifest for content that is not a runnable image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    pub media_type: String,
    pub artifact_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blobs: Vec<ArtifactDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<ArtifactDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl ArtifactManifest {
    pub fn new(artifact_type: impl Into<String>, subject: &Descriptor) -> Self {
        Self {
            media_type: media_types::ARTIFACT_MANIFEST.to_string(),
            artifact_type: artifact_type.into(),
            blobs: Vec::new(),
            subject: Some(subject.into()),
            annotations: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_projection_copies_fields() {
        let subject = Descriptor::from_bytes(media_types::OCI_IMAGE_MANIFEST, b"{}").with_name("image");
        let manifest = ArtifactManifest::new("application/vnd.example.sbom", &subject);

        let projected = manifest.subject.as_ref().unwrap();
        assert_eq!(projected.media_type, subject.media_type);
        assert_eq!(projected.digest, subject.digest);
        assert_eq!(projected.size, subject.size);
        assert_eq!(projected.annotations, subject.annotations);
    }

    #[test]
    fn test_artifact_manifest_json() {
        let subject = Descriptor::from_bytes(media_types::OCI_IMAGE_MANIFEST, b"{}");
        let manifest = ArtifactManifest::new("application/vnd.example.sbom", &subject);
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["mediaType"], media_types::ARTIFACT_MANIFEST);
        assert_eq!(json["artifactType"], "application/vnd.example.sbom");
        assert_eq!(json["subject"]["digest"], subject.digest.as_str());
        assert!(json.get("blobs").is_none());
    }
}
