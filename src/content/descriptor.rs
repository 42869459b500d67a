//! OCI content descriptors and digests

use crate::{OrasError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Annotation holding the file name of a blob
pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";

/// Length of the short digest form used for display
const SHORT_DIGEST_LEN: usize = 12;

/// Algorithm-tagged content digest (e.g. `sha256:<hex>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Parse a digest string
    pub fn parse(value: &str) -> Result<Self> {
        let (algorithm, encoded) = value
            .split_once(':')
            .ok_or_else(|| OrasError::InvalidDigest(value.to_string()))?;

        let algorithm_ok = !algorithm.is_empty()
            && algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c));
        let encoded_ok = !encoded.is_empty()
            && encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "=_-".contains(c));
        if !algorithm_ok || !encoded_ok {
            return Err(OrasError::InvalidDigest(value.to_string()));
        }

        if algorithm == "sha256"
            && (encoded.len() != 64 || !encoded.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')))
        {
            return Err(OrasError::InvalidDigest(value.to_string()));
        }

        Ok(Self(value.to_string()))
    }

    /// Compute the sha256 digest of bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    /// Algorithm part, e.g. `sha256`
    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(a, _)| a).unwrap_or_default()
    }

    /// Encoded hash part
    pub fn encoded(&self) -> &str {
        self.0.split_once(':').map(|(_, e)| e).unwrap_or_default()
    }

    /// First 12 characters of the encoded hash
    pub fn short(&self) -> &str {
        let encoded = self.encoded();
        &encoded[..encoded.len().min(SHORT_DIGEST_LEN)]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Digest::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// OCI Content Descriptor
///
/// Two descriptors are equal when their digests are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: Digest,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl Descriptor {
    /// Describe a blob held in memory
    pub fn from_bytes(media_type: impl Into<String>, data: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            digest: Digest::from_bytes(data),
            size: data.len() as i64,
            annotations: None,
        }
    }

    /// Return a copy with the title annotation set
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.annotations
            .get_or_insert_with(HashMap::new)
            .insert(ANNOTATION_TITLE.to_string(), name.into());
        self
    }

    /// Name of the content, if the title annotation is present
    pub fn name(&self) -> Option<&str> {
        resolve_name(self)
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

/// Resolve the file name of a descriptor from its annotations
pub fn resolve_name(desc: &Descriptor) -> Option<&str> {
    desc.annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_TITLE))
        .map(String::as_str)
}

/// OCI Image Manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

/// Media types
pub mod media_types {
    pub const OCI_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
    pub const OCI_IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
    pub const OCI_LAYER_TAR: &str = "application/vnd.oci.image.layer.v1.tar";
    pub const ARTIFACT_MANIFEST: &str = "application/vnd.cncf.oras.artifact.manifest.v1+json";

    pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Config media type used when the caller does not set one
    pub const UNKNOWN_CONFIG: &str = "application/vnd.unknown.config.v1+json";

    /// Media types a manifest resolve accepts
    pub const MANIFEST_ACCEPT: &[&str] = &[
        OCI_IMAGE_MANIFEST,
        OCI_IMAGE_INDEX,
        ARTIFACT_MANIFEST,
        DOCKER_MANIFEST_V2,
        DOCKER_MANIFEST_LIST,
    ];

    pub fn is_manifest(media_type: &str) -> bool {
        MANIFEST_ACCEPT.contains(&media_type)
    }
}
