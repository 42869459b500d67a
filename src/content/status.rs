//! Upload progress reporting

use crate::content::descriptor::{resolve_name, Descriptor};
use crate::content::handler::Handler;
use crate::Result;
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Handler printing one `Uploading <digest> <name>` line per named descriptor
///
/// The lock belongs to the tracker, so concurrent uploads reporting to the
/// same tracker never interleave within a line while separate trackers stay
/// independent.
pub struct StatusTracker<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> StatusTracker<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the tracker and return its sink
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<W: Write + Send> Handler for StatusTracker<W> {
    async fn handle(&self, desc: &Descriptor) -> Result<Vec<Descriptor>> {
        if let Some(name) = resolve_name(desc) {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(writer, "Uploading {} {}", desc.digest.short(), name)?;
        }
        Ok(Vec::new())
    }
}
