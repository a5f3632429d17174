pub mod gemini;
pub mod types;

use crate::annotation::DocumentAnnotation;
use anyhow::Result;

pub use gemini::GeminiAnnotator;

pub trait Annotator {
    /// Produces an annotation for the raw document bytes following `instructions`.
    fn annotate(&self, document: &[u8], instructions: &str) -> Result<DocumentAnnotation>;
}
