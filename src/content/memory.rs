//! In-memory content store
//!
//! Holds the blobs and manifests assembled for a push, and doubles as a
//! registry stand-in for library callers that want no network.

use crate::content::descriptor::{Descriptor, Digest};
use crate::registry::reference::Reference;
use crate::registry::scope::ScopeHint;
use crate::registry::{ManifestStore, ScopeRegistry, Target};
use crate::{OrasError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct State {
    contents: HashMap<Digest, (Descriptor, Vec<u8>)>,
    tags: HashMap<String, Digest>,
    scope_hints: Vec<(String, ScopeHint)>,
    /// Operation log, in call order
    events: Vec<String>,
}

/// Content store backed by memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `data` and return its descriptor, named when `name` is given
    pub fn add(&self, media_type: &str, data: Vec<u8>, name: Option<&str>) -> Descriptor {
        let mut desc = Descriptor::from_bytes(media_type, &data);
        if let Some(name) = name {
            desc = desc.with_name(name);
        }
        self.set(desc.clone(), data);
        desc
    }

    /// Store `data` under an existing descriptor
    pub fn set(&self, desc: Descriptor, data: Vec<u8>) {
        self.state()
            .contents
            .insert(desc.digest.clone(), (desc, data));
    }

    pub fn fetch(&self, desc: &Descriptor) -> Result<Vec<u8>> {
        self.state()
            .contents
            .get(&desc.digest)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| OrasError::NotFound(desc.digest.to_string()))
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.state().contents.contains_key(digest)
    }

    /// Digest currently tagged `tag`
    pub fn tagged(&self, tag: &str) -> Option<Digest> {
        self.state().tags.get(tag).cloned()
    }

    /// Scope hints registered so far, in order
    pub fn scope_hints(&self) -> Vec<(String, ScopeHint)> {
        self.state().scope_hints.clone()
    }

    /// Operations performed so far, e.g. `resolve v1`, `delete sha256:...`
    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    fn record(&self, event: String) {
        self.state().events.push(event);
    }
}

/// Tag or digest part of a full or bare reference
fn reference_part(reference: &str) -> Result<String> {
    if reference.contains('/') {
        Ok(Reference::parse(reference)?.reference)
    } else {
        Ok(reference.to_string())
    }
}

#[async_trait]
impl ManifestStore for MemoryStore {
    async fn resolve(&self, reference: &str) -> Result<Descriptor> {
        self.record(format!("resolve {}", reference));
        let part = reference_part(reference)?;
        let state = self.state();

        let digest = match Digest::parse(&part) {
            Ok(digest) => Some(digest),
            Err(_) => state.tags.get(&part).cloned(),
        };

        digest
            .and_then(|d| state.contents.get(&d))
            .map(|(desc, _)| desc.clone())
            .ok_or_else(|| OrasError::NotFound(reference.to_string()))
    }

    async fn delete(&self, desc: &Descriptor) -> Result<()> {
        self.record(format!("delete {}", desc.digest));
        let mut state = self.state();

        if state.contents.remove(&desc.digest).is_none() {
            return Err(OrasError::NotFound(desc.digest.to_string()));
        }
        state.tags.retain(|_, digest| *digest != desc.digest);
        Ok(())
    }
}

#[async_trait]
impl Target for MemoryStore {
    async fn exists(&self, desc: &Descriptor) -> Result<bool> {
        Ok(self.contains(&desc.digest))
    }

    async fn push(&self, desc: &Descriptor, content: Vec<u8>) -> Result<()> {
        if Digest::from_bytes(&content) != desc.digest {
            return Err(OrasError::Registry(format!(
                "{}: content does not match digest",
                desc.digest
            )));
        }
        self.record(format!("push {}", desc.digest));
        self.set(desc.clone(), content);
        Ok(())
    }

    async fn tag(&self, desc: &Descriptor, content: Vec<u8>, reference: &str) -> Result<()> {
        if !self.contains(&desc.digest) {
            self.set(desc.clone(), content);
        }
        self.record(format!("tag {}", reference));
        self.state()
            .tags
            .insert(reference.to_string(), desc.digest.clone());
        Ok(())
    }
}

impl ScopeRegistry for MemoryStore {
    fn register_scope_hints(&self, repository: &str, hints: &ScopeHint) {
        self.record(format!("scope {}", repository));
        self.state()
            .scope_hints
            .push((repository.to_string(), hints.clone()));
    }
}
