//! Registry access: storage seams, references, scopes and the HTTP client

pub mod auth;
pub mod reference;
pub mod remote;
pub mod scope;

pub use reference::Reference;
pub use remote::{RemoteOptions, Repository};
pub use scope::{delete_scope_hints, AuthAction, ReferrersSupport, ScopeHint};

use crate::content::descriptor::Descriptor;
use crate::Result;
use async_trait::async_trait;

/// Manifest resolution and deletion
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Resolve a tag or digest to a manifest descriptor
    ///
    /// Returns `OrasError::NotFound` when the manifest does not exist.
    async fn resolve(&self, reference: &str) -> Result<Descriptor>;

    /// Delete the manifest identified by `desc`
    async fn delete(&self, desc: &Descriptor) -> Result<()>;
}

/// Destination of a push
#[async_trait]
pub trait Target: Send + Sync {
    async fn exists(&self, desc: &Descriptor) -> Result<bool>;

    async fn push(&self, desc: &Descriptor, content: Vec<u8>) -> Result<()>;

    /// Push a manifest under a tag
    async fn tag(&self, desc: &Descriptor, content: Vec<u8>, reference: &str) -> Result<()>;
}

/// Registration of authentication scope hints for a repository
pub trait ScopeRegistry: Send + Sync {
    fn register_scope_hints(&self, repository: &str, hints: &ScopeHint);
}
