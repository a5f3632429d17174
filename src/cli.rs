use crate::{
    annotator::GeminiAnnotator,
    config::{self, Config, Overrides},
    document::LopdfStore,
    intake::{scan, Intake},
    pipeline::Pipeline,
    prompt::load_instructions,
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

#[derive(Parser, Debug)]
#[command(name = "pdf-annotator")]
#[command(about = "Watch a directory for PDFs, annotate them with Gemini, and file them under AI-suggested names")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Path to config TOML. If omitted, uses ./pdf-annotator.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory to monitor for incoming PDF files.
    #[arg(long, visible_alias = "input_dir", env = "INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// File pattern to match, e.g. '*.pdf'.
    #[arg(long, visible_alias = "file_pattern", env = "FILE_PATTERN")]
    pub file_pattern: Option<String>,

    /// Directory where processed files are saved.
    #[arg(long, visible_alias = "output_dir", env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Seconds between directory scans.
    #[arg(long, visible_alias = "poll_interval", env = "POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Seconds to pause after each processed file.
    #[arg(long, visible_alias = "task_pause_time", env = "TASK_PAUSE_TIME")]
    pub task_pause_time: Option<u64>,

    /// Ask before saving each updated file and before deleting each original.
    #[arg(long, env = "CAUTIOUS", value_parser = parse_switch)]
    pub cautious: bool,
}

/// `true`, `1` and `yes` in any case turn a switch on; anything else leaves it off.
pub fn parse_switch(raw: &str) -> Result<bool, std::convert::Infallible> {
    let raw = raw.trim();
    Ok(["true", "1", "yes"]
        .iter()
        .any(|on| raw.eq_ignore_ascii_case(on)))
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the input directory forever (default).
    Watch {},
    /// Process whatever currently matches, then exit.
    Once {},
    /// Run the pipeline on a single file.
    Annotate {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print a configuration diagnostic.
    Doctor {},
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            file_pattern: self.file_pattern.clone(),
            poll_interval: self.poll_interval,
            task_pause_time: self.task_pause_time,
            cautious: self.cautious,
        }
    }
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = Config::resolve(args.config.as_deref())?;
    cfg.apply_overrides(&args.overrides());

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        None | Some(Command::Watch {}) => watch(&cfg),
        Some(Command::Once {}) => once(&cfg),
        Some(Command::Annotate { input }) => annotate(&cfg, input),
        Some(Command::Doctor {}) => doctor(&cfg),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console output, JSON or plain per `logging.json`.
fn console_layer(logging: &config::Logging) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer().with_target(logging.json);
    if logging.json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Appends to `path` through a background writer; the guard flushes it on drop.
fn file_layer(logging: &config::Logging, path: &Path) -> Result<(BoxedLayer, WorkerGuard)> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file: {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    let layer = if logging.json {
        layer.json().boxed()
    } else {
        layer.boxed()
    };
    Ok((layer, guard))
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers = vec![console_layer(&cfg.logging)];
    let guard = match file_path {
        Some(path) => {
            let (layer, guard) = file_layer(&cfg.logging, path)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn build_intake(cfg: &Config) -> Result<Intake<GeminiAnnotator, LopdfStore>> {
    cfg.validate_paths()?;
    let annotator = GeminiAnnotator::new(cfg)?;
    let instructions = load_instructions(cfg)?;
    let pipeline = Pipeline::new(cfg, instructions, annotator, LopdfStore::new(cfg))?;
    Ok(Intake::new(cfg, pipeline))
}

fn watch(cfg: &Config) -> Result<()> {
    build_intake(cfg)?.run()
}

fn once(cfg: &Config) -> Result<()> {
    let summary = build_intake(cfg)?.poll_once();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn annotate(cfg: &Config, input: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    if cfg.paths.output_dir.is_empty() || !cfg.output_dir().is_dir() {
        return Err(anyhow!(
            "output directory '{}' does not exist",
            cfg.paths.output_dir
        ));
    }
    let annotator = GeminiAnnotator::new(cfg)?;
    let instructions = load_instructions(cfg)?;
    let pipeline = Pipeline::new(cfg, instructions, annotator, LopdfStore::new(cfg))?;
    let report = pipeline.process_and_report(input);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let input_ok = !cfg.paths.input_dir.is_empty() && cfg.input_dir().is_dir();
    let output_ok = !cfg.paths.output_dir.is_empty() && cfg.output_dir().is_dir();
    let matching = if input_ok {
        match scan(cfg) {
            Ok(files) => serde_json::json!(files.len()),
            Err(e) => serde_json::json!(format!("{e:#}")),
        }
    } else {
        serde_json::Value::Null
    };
    let instructions = match load_instructions(cfg) {
        Ok(text) => serde_json::json!(format!("{} bytes", text.len())),
        Err(e) => serde_json::json!(format!("{e:#}")),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input_dir": cfg.paths.input_dir,
            "input_dir_exists": input_ok,
            "output_dir": cfg.paths.output_dir,
            "output_dir_exists": output_ok,
            "file_pattern": cfg.paths.file_pattern,
            "matching_files": matching,
            "cautious": cfg.intake.cautious,
            "model": cfg.gemini.model,
            "api_key_env": cfg.gemini.api_key_env,
            "api_key_present": cfg.gemini.api_key().is_ok(),
            "instructions": instructions,
        }))?
    );
    Ok(())
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("logs").join("pdf-annotator.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_creates_log_directory_in_either_format() {
        let tmp = tempfile::tempdir().unwrap();
        for json in [false, true] {
            let logging = config::Logging {
                json,
                ..Default::default()
            };
            let path = tmp.path().join(format!("nested-{json}")).join("run.log");
            let (_layer, _guard) = file_layer(&logging, &path).unwrap();
            assert!(path.is_file());
        }
    }

    #[test]
    fn log_path_defaults_under_logs() {
        let mut cfg = Config::default();
        assert_eq!(resolve_log_path(&cfg), None);
        cfg.logging.write_to_file = true;
        assert_eq!(
            resolve_log_path(&cfg),
            Some(PathBuf::from("logs").join("pdf-annotator.log"))
        );
        cfg.logging.file_path = "custom.log".into();
        assert_eq!(resolve_log_path(&cfg), Some(PathBuf::from("custom.log")));
    }
}
