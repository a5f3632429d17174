//! The structured result returned by the annotator and the gate that checks it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Summary, keywords, title and proposed filename for one document.
///
/// Missing JSON fields deserialize as empty strings so that an incomplete
/// response is reported by [`DocumentAnnotation::validate`] rather than as a
/// parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnnotation {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("annotation has an empty {0}")]
    EmptyField(&'static str),
    #[error("generated filename '{filename}' does not end with '{extension}'")]
    WrongExtension { filename: String, extension: String },
}

impl DocumentAnnotation {
    /// Checks that every field is present and the filename carries `required_extension`.
    pub fn validate(&self, required_extension: &str) -> Result<ValidatedAnnotation, ValidationError> {
        for (name, value) in [
            ("summary", &self.summary),
            ("keywords", &self.keywords),
            ("title", &self.title),
            ("filename", &self.filename),
        ] {
            if value.is_empty() {
                return Err(ValidationError::EmptyField(name));
            }
        }
        if !self.filename.ends_with(required_extension) {
            return Err(ValidationError::WrongExtension {
                filename: self.filename.clone(),
                extension: required_extension.to_string(),
            });
        }
        Ok(ValidatedAnnotation(self.clone()))
    }
}

/// An annotation that passed validation. Read-only from here on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedAnnotation(DocumentAnnotation);

impl ValidatedAnnotation {
    pub fn summary(&self) -> &str {
        &self.0.summary
    }

    pub fn keywords(&self) -> &str {
        &self.0.keywords
    }

    pub fn title(&self) -> &str {
        &self.0.title
    }

    pub fn filename(&self) -> &str {
        &self.0.filename
    }
}
