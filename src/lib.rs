//! oras - push and manage OCI artifacts on remote registries
//!
//! This crate provides the push configuration and handler pipeline used to
//! upload artifacts, and the manifest deletion workflow, on top of a small
//! OCI distribution client.

pub mod cli;
pub mod content;
pub mod manifest;
pub mod push;
pub mod registry;

use content::validate::ValidationError;
use thiserror::Error;

/// Main error type for oras operations
#[derive(Error, Debug)]
pub enum OrasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid name: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("{0}: invalid reference: missing tag or digest")]
    InvalidReference(String),

    /// Store-level "not found", as returned by a `ManifestStore` or `Target`
    #[error("{0}: not found")]
    NotFound(String),

    #[error("{reference}: the specified manifest does not exist")]
    ManifestNotFound { reference: String },

    #[error("failed to delete {reference}: {source}")]
    Delete {
        reference: String,
        #[source]
        source: Box<OrasError>,
    },

    #[error("{0}")]
    Configuration(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl OrasError {
    /// Whether the error reports missing content
    pub fn is_not_found(&self) -> bool {
        match self {
            OrasError::NotFound(_) | OrasError::ManifestNotFound { .. } => true,
            OrasError::Delete { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrasError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "oras";
