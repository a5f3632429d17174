pub mod pdf;

use anyhow::Result;
use std::path::Path;

pub use pdf::LopdfStore;

/// The three descriptive fields written into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFields {
    pub title: String,
    pub description: String,
    pub subject: String,
}

pub trait DocumentStore {
    type Doc: Document;

    /// Opens `path` for editing. Fails if the file is not a readable document.
    fn open(&self, path: &Path) -> Result<Self::Doc>;
}

pub trait Document {
    /// Writes all fields or none of them.
    fn write_metadata(&mut self, fields: &MetadataFields) -> Result<()>;
    fn save_as(&mut self, dest: &Path) -> Result<()>;
}
