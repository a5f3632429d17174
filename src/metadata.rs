use crate::{
    annotation::ValidatedAnnotation,
    document::{Document, MetadataFields},
};
use anyhow::Result;

pub fn fields_for(annotation: &ValidatedAnnotation) -> MetadataFields {
    MetadataFields {
        title: annotation.title().to_string(),
        description: annotation.summary().to_string(),
        subject: annotation.keywords().to_string(),
    }
}

/// Writes title, description and subject in one metadata transaction.
/// Only the in-memory document changes; saving is the caller's job.
pub fn apply<D: Document>(doc: &mut D, annotation: &ValidatedAnnotation) -> Result<()> {
    doc.write_metadata(&fields_for(annotation))
}
