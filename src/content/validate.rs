//! Validation of blob names as portable relative file paths
//!
//! Names become on-disk paths when an artifact is pulled into a directory,
//! so only clean, slash-separated, relative paths that stay inside the
//! target directory are accepted, whatever the host platform.

use crate::content::descriptor::{resolve_name, Descriptor};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no name")]
    NoName,

    #[error("{0}: dirty file path")]
    DirtyPath(String),

    #[error("{0}: path not slash separated")]
    PathNotSlashSeparated(String),

    #[error("{0}: absolute file path disallowed")]
    AbsolutePathDisallowed(String),

    #[error("{0}: path traversal disallowed")]
    PathTraversalDisallowed(String),
}

/// Validate the name of a descriptor as a relative, slash-separated file path
pub fn validate_name_as_path(desc: &Descriptor) -> Result<(), ValidationError> {
    let path = match resolve_name(desc) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ValidationError::NoName),
    };

    if clean_path(path) != path {
        return Err(ValidationError::DirtyPath(path.to_string()));
    }

    if path.contains('\\') {
        return Err(ValidationError::PathNotSlashSeparated(path.to_string()));
    }

    // unix and windows forms
    if path.starts_with('/') || has_drive_prefix(path) {
        return Err(ValidationError::AbsolutePathDisallowed(path.to_string()));
    }

    if path == ".." || path.starts_with("../") {
        return Err(ValidationError::PathTraversalDisallowed(path.to_string()));
    }

    Ok(())
}

/// `C:/...`
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

/// Lexically clean a slash-separated path: collapse repeated separators,
/// drop `.` elements, resolve `name/..` pairs and trailing slashes.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
