use crate::pipeline::Outcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Relocated,
    SaveDeclined,
    DeleteDeclined,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    pub started: String,
    pub finished: String,
}

impl FileReport {
    pub fn status_for(outcome: &Outcome) -> FileStatus {
        match outcome {
            Outcome::Relocated { .. } => FileStatus::Relocated,
            Outcome::SaveDeclined { .. } => FileStatus::SaveDeclined,
            Outcome::DeleteDeclined { .. } => FileStatus::DeleteDeclined,
            Outcome::Rejected { .. } => FileStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassSummary {
    pub scanned: usize,
    pub files: Vec<FileReport>,
}

impl PassSummary {
    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }
}
