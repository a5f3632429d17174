use crate::{
    annotation::{DocumentAnnotation, ValidatedAnnotation},
    annotator::Annotator,
    config::Config,
    confirm::{Confirm, Question, StdinConfirm, Step},
    document::{Document, DocumentStore},
    metadata,
    report::{FileReport, FileStatus},
    util::{hash_file, now_rfc3339, same_file},
};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tracing::{error, info, warn};

/// Terminal state of one file that did not fail with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Saved under the new name. `original_removed` is false only when the
    /// destination is the source file itself.
    Relocated {
        destination: PathBuf,
        original_removed: bool,
    },
    SaveDeclined { destination: PathBuf },
    /// Both the renamed copy and the original are on disk.
    DeleteDeclined { destination: PathBuf },
    Rejected { reason: String },
}

pub struct Pipeline<A: Annotator, S: DocumentStore> {
    cfg: Config,
    instructions: String,
    filename_pattern: Option<Regex>,
    annotator: A,
    store: S,
    confirm: Box<dyn Confirm>,
}

impl<A: Annotator, S: DocumentStore> Pipeline<A, S> {
    pub fn new(cfg: &Config, instructions: impl Into<String>, annotator: A, store: S) -> Result<Self> {
        let filename_pattern = if cfg.validation.filename_pattern.is_empty() {
            None
        } else {
            Some(Regex::new(&cfg.validation.filename_pattern).with_context(|| {
                format!(
                    "invalid validation.filename_pattern: {}",
                    cfg.validation.filename_pattern
                )
            })?)
        };
        Ok(Self {
            cfg: cfg.clone(),
            instructions: instructions.into(),
            filename_pattern,
            annotator,
            store,
            confirm: Box::new(StdinConfirm),
        })
    }

    /// Replaces the stdin prompt used in cautious mode.
    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn cautious(&self) -> bool {
        self.cfg.intake.cautious
    }

    /// Annotates `input` and relocates it into the output directory.
    ///
    /// Errors leave the original where it is; only a completed run removes it.
    pub fn process(&self, input: &Path) -> Result<Outcome> {
        info!("processing file: {}", input.display());

        let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let annotation = self
            .annotator
            .annotate(&bytes, &self.instructions)
            .with_context(|| format!("annotating {}", input.display()))?;

        let annotation = match self.check(&annotation) {
            Ok(a) => a,
            Err(reason) => {
                warn!("rejected annotation for {}: {reason}", input.display());
                return Ok(Outcome::Rejected { reason });
            }
        };

        info!("title: {}", annotation.title());
        info!("summary: {}", annotation.summary());
        info!("keywords: {}", annotation.keywords());
        info!("new filename: {}", annotation.filename());

        let destination = self.destination_for(annotation.filename())?;
        self.relocate(input, &annotation, destination)
    }

    /// Same as [`Pipeline::process`] but never fails; errors become a `Failed` report.
    pub fn process_and_report(&self, input: &Path) -> FileReport {
        let started = now_rfc3339();
        let sha256 = hash_file(input).ok();
        let result = self.process(input);
        let finished = now_rfc3339();

        let path = input.display().to_string();
        match result {
            Ok(outcome) => {
                let status = FileReport::status_for(&outcome);
                let (destination, detail) = match &outcome {
                    Outcome::Relocated { destination, .. }
                    | Outcome::SaveDeclined { destination }
                    | Outcome::DeleteDeclined { destination } => {
                        (Some(destination.display().to_string()), None)
                    }
                    Outcome::Rejected { reason } => (None, Some(reason.clone())),
                };
                FileReport {
                    path,
                    status,
                    destination,
                    detail,
                    sha256,
                    started,
                    finished,
                }
            }
            Err(err) => {
                error!("error processing file '{}': {:#}", input.display(), err);
                FileReport {
                    path,
                    status: FileStatus::Failed,
                    destination: None,
                    detail: Some(format!("{err:#}")),
                    sha256,
                    started,
                    finished,
                }
            }
        }
    }

    fn check(&self, annotation: &DocumentAnnotation) -> Result<ValidatedAnnotation, String> {
        let validated = annotation
            .validate(&self.cfg.validation.required_extension)
            .map_err(|e| e.to_string())?;
        if let Some(re) = &self.filename_pattern {
            if !re.is_match(validated.filename()) {
                return Err(format!(
                    "generated filename '{}' does not match {}",
                    validated.filename(),
                    re.as_str()
                ));
            }
        }
        Ok(validated)
    }

    /// Joins the output directory with a filename that must be a single plain component.
    fn destination_for(&self, filename: &str) -> Result<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.cfg.output_dir().join(name)),
            _ => Err(anyhow!(
                "generated filename '{filename}' is not a plain file name"
            )),
        }
    }

    fn relocate(&self, input: &Path, annotation: &ValidatedAnnotation, destination: PathBuf) -> Result<Outcome> {
        let mut doc = self.store.open(input)?;
        metadata::apply(&mut doc, annotation)?;

        if self.cautious()
            && !self.confirm.confirm(&Question {
                step: Step::Save,
                path: destination.clone(),
            })?
        {
            info!("skipping saving of updated file");
            return Ok(Outcome::SaveDeclined { destination });
        }

        let in_place = same_file(input, &destination);
        if destination.exists() && !in_place && !self.cfg.relocation.overwrite_existing {
            return Err(anyhow!(
                "destination already exists: {}",
                destination.display()
            ));
        }

        doc.save_as(&destination)?;
        drop(doc);
        info!("updated file saved to: {}", destination.display());

        if in_place {
            info!("destination is the original file; nothing to delete");
            return Ok(Outcome::Relocated {
                destination,
                original_removed: false,
            });
        }

        if self.cautious()
            && !self.confirm.confirm(&Question {
                step: Step::Delete,
                path: input.to_path_buf(),
            })?
        {
            info!("skipping deletion of original file");
            return Ok(Outcome::DeleteDeclined { destination });
        }

        std::fs::remove_file(input)
            .with_context(|| format!("removing original {}", input.display()))?;
        info!("original file '{}' deleted", input.display());

        Ok(Outcome::Relocated {
            destination,
            original_removed: true,
        })
    }
}
