//! Registry references: `<registry>/<repository>[:<tag>|@<digest>]`

use crate::content::descriptor::Digest;
use crate::{OrasError, Result};
use std::fmt;

/// Parsed registry reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Registry host, e.g. "localhost:5000", "ghcr.io"
    pub registry: String,
    /// Repository, e.g. "hello", "owner/repo"
    pub repository: String,
    /// Tag or digest; empty for a bare repository
    pub reference: String,
}

impl Reference {
    /// Parse a reference string
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = || OrasError::InvalidReference(raw.to_string());

        let (registry, rest) = raw.split_once('/').ok_or_else(invalid)?;
        if registry.is_empty() || rest.is_empty() {
            return Err(invalid());
        }

        let (repository, reference) = match rest.split_once('@') {
            Some((path, digest)) => {
                Digest::parse(digest).map_err(|_| invalid())?;
                // a tag next to a digest is ignored
                let path = path.rsplit_once(':').map(|(p, _)| p).unwrap_or(path);
                (path, digest)
            }
            None => match rest.rsplit_once(':') {
                Some((path, tag)) => {
                    if !is_valid_tag(tag) {
                        return Err(invalid());
                    }
                    (path, tag)
                }
                None => (rest, ""),
            },
        };

        if !is_valid_repository(repository) {
            return Err(invalid());
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Whether the reference part is a digest
    pub fn is_digest(&self) -> bool {
        Digest::parse(&self.reference).is_ok()
    }

    /// Digest form of the reference part, if it is one
    pub fn digest(&self) -> Option<Digest> {
        Digest::parse(&self.reference).ok()
    }

    /// Base URL of the registry API
    pub fn registry_url(&self, plain_http: bool) -> String {
        if plain_http || self.registry.starts_with("localhost") || self.registry.starts_with("127.0.0.1") {
            format!("http://{}", self.registry)
        } else {
            format!("https://{}", self.registry)
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if self.reference.is_empty() {
            Ok(())
        } else if self.is_digest() {
            write!(f, "@{}", self.reference)
        } else {
            write!(f, ":{}", self.reference)
        }
    }
}

fn is_valid_repository(repository: &str) -> bool {
    !repository.is_empty()
        && repository.split('/').all(|component| {
            !component.is_empty()
                && component.chars().all(|c| {
                    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
                })
        })
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() || first == '_' => {}
        _ => return false,
    }
    tag.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
