use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub intake: Intake,
    #[serde(default)]
    pub validation: Validation,
    #[serde(default)]
    pub relocation: Relocation,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub gemini: Gemini,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Loads `path` when given, else `./pdf-annotator.toml` if present, else defaults.
    pub fn resolve(user: Option<&Path>) -> Result<Self> {
        if let Some(p) = user {
            return Self::load(p);
        }
        let default = PathBuf::from("pdf-annotator.toml");
        if default.exists() {
            Self::load(&default)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(dir) = &o.input_dir {
            self.paths.input_dir = dir.display().to_string();
        }
        if let Some(dir) = &o.output_dir {
            self.paths.output_dir = dir.display().to_string();
        }
        if let Some(pattern) = &o.file_pattern {
            self.paths.file_pattern = pattern.clone();
        }
        if let Some(secs) = o.poll_interval {
            self.intake.poll_interval_secs = secs;
        }
        if let Some(secs) = o.task_pause_time {
            self.intake.task_pause_secs = secs;
        }
        if o.cautious {
            self.intake.cautious = true;
        }
    }

    pub fn input_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.input_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.output_dir)
    }

    /// Startup check: both directories must be configured and exist.
    pub fn validate_paths(&self) -> Result<()> {
        if self.paths.input_dir.is_empty() {
            return Err(anyhow!(
                "input directory not provided; use --input-dir or set INPUT_DIR"
            ));
        }
        if self.paths.output_dir.is_empty() {
            return Err(anyhow!(
                "output directory not provided; use --output-dir or set OUTPUT_DIR"
            ));
        }
        if !self.input_dir().is_dir() {
            return Err(anyhow!(
                "input directory '{}' does not exist",
                self.paths.input_dir
            ));
        }
        if !self.output_dir().is_dir() {
            return Err(anyhow!(
                "output directory '{}' does not exist",
                self.paths.output_dir
            ));
        }
        if self.paths.file_pattern.trim().is_empty() {
            return Err(anyhow!("file pattern is empty"));
        }
        Ok(())
    }
}

/// Values that the command line (or its environment fallbacks) may override.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub file_pattern: Option<String>,
    pub poll_interval: Option<u64>,
    pub task_pause_time: Option<u64>,
    pub cautious: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub input_dir: String,
    pub output_dir: String,
    pub file_pattern: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            input_dir: "".into(),
            output_dir: "".into(),
            file_pattern: "*.pdf".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intake {
    pub poll_interval_secs: u64,
    pub task_pause_secs: u64,
    pub cautious: bool,
}
impl Default for Intake {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            task_pause_secs: 60,
            cautious: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub required_extension: String,
    /// Optional regex the generated filename must match. Empty disables the check.
    pub filename_pattern: String,
}
impl Default for Validation {
    fn default() -> Self {
        Self {
            required_extension: ".pdf".into(),
            filename_pattern: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relocation {
    pub overwrite_existing: bool,
}
impl Default for Relocation {
    fn default() -> Self {
        Self {
            overwrite_existing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub write_xmp: bool,
}
impl Default for Metadata {
    fn default() -> Self {
        Self { write_xmp: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gemini {
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub upload_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    /// 0 waits forever.
    pub request_timeout_secs: u64,
    pub connect_retries: u32,
    pub inline_limit_bytes: u64,
    pub instructions_file: String,
}
impl Default for Gemini {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            api_key_env: "GEMINI_KEY".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            upload_url: "https://generativelanguage.googleapis.com/upload/v1beta/files".into(),
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            request_timeout_secs: 0,
            connect_retries: 2,
            inline_limit_bytes: 20 * 1024 * 1024,
            instructions_file: "".into(),
        }
    }
}

impl Gemini {
    pub fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env)
            .map_err(|_| anyhow!("API key not set; export {} or add it to .env", self.api_key_env))?;
        if key.trim().is_empty() {
            return Err(anyhow!("API key in {} is empty", self.api_key_env));
        }
        Ok(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
