use crate::{
    annotator::Annotator,
    config::Config,
    document::DocumentStore,
    pipeline::Pipeline,
    report::{FileStatus, PassSummary},
};
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Files in the input directory matching the configured pattern, sorted.
///
/// The directory part is escaped so only `file_pattern` is treated as a glob.
pub fn scan(cfg: &Config) -> Result<Vec<PathBuf>> {
    let dir = glob::Pattern::escape(&cfg.paths.input_dir);
    let pattern = format!("{}/{}", dir.trim_end_matches('/'), cfg.paths.file_pattern);
    let entries = glob::glob(&pattern)
        .map_err(|e| anyhow!("invalid file pattern '{}': {e}", cfg.paths.file_pattern))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => warn!("skipping unreadable entry: {err}"),
        }
    }
    files.sort();
    Ok(files)
}

/// Polls the input directory and feeds matches to the pipeline one at a time.
pub struct Intake<A: Annotator, S: DocumentStore> {
    cfg: Config,
    pipeline: Pipeline<A, S>,
}

impl<A: Annotator, S: DocumentStore> Intake<A, S> {
    pub fn new(cfg: &Config, pipeline: Pipeline<A, S>) -> Self {
        Self {
            cfg: cfg.clone(),
            pipeline,
        }
    }

    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        scan(&self.cfg)
    }

    /// One poll: snapshot the directory, process each file, pause after each.
    pub fn poll_once(&self) -> PassSummary {
        let files = match self.scan() {
            Ok(files) => files,
            Err(err) => {
                warn!("scan failed: {err:#}");
                return PassSummary::default();
            }
        };
        debug!("scan found {} file(s)", files.len());

        let mut summary = PassSummary {
            scanned: files.len(),
            files: Vec::with_capacity(files.len()),
        };
        for path in &files {
            let report = self.pipeline.process_and_report(path);
            summary.files.push(report);
            self.pause(self.cfg.intake.task_pause_secs);
        }

        if summary.scanned > 0 {
            info!(
                "pass done: relocated={} rejected={} declined={} failed={}",
                summary.count(FileStatus::Relocated),
                summary.count(FileStatus::Rejected),
                summary.count(FileStatus::SaveDeclined) + summary.count(FileStatus::DeleteDeclined),
                summary.count(FileStatus::Failed)
            );
        }
        summary
    }

    /// Runs forever.
    pub fn run(&self) -> Result<()> {
        info!(
            "monitoring directory: {} for files matching: {}",
            self.cfg.paths.input_dir, self.cfg.paths.file_pattern
        );
        info!("processed files will be saved to: {}", self.cfg.paths.output_dir);
        info!(
            "polling interval: {}s, task pause: {}s, cautious mode: {}",
            self.cfg.intake.poll_interval_secs,
            self.cfg.intake.task_pause_secs,
            if self.cfg.intake.cautious { "ON" } else { "OFF" }
        );

        loop {
            self.poll_once();
            self.pause(self.cfg.intake.poll_interval_secs);
        }
    }

    fn pause(&self, secs: u64) {
        if secs > 0 {
            std::thread::sleep(Duration::from_secs(secs));
        }
    }
}
