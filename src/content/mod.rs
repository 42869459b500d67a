//! Content model and descriptor processing

pub mod descriptor;
pub mod handler;
pub mod memory;
pub mod status;
pub mod validate;

pub use descriptor::{resolve_name, Descriptor, Digest, ImageManifest};
pub use handler::{dispatch, handler_fn, Handler, Handlers};
pub use memory::MemoryStore;
pub use status::StatusTracker;
pub use validate::{validate_name_as_path, ValidationError};
