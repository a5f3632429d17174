//! Gemini `generateContent` client that returns a [`DocumentAnnotation`].
//!
//! Small documents travel inline as base64. Anything above
//! `gemini.inline_limit_bytes` goes through the Files API first and is
//! deleted again once the annotation is back.

use super::{types::*, Annotator};
use crate::{annotation::DocumentAnnotation, config::Config};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, info, warn};

const PDF_MIME: &str = "application/pdf";
const USER_AGENT: &str = concat!("pdf-annotator/", env!("CARGO_PKG_VERSION"));
const UPLOAD_POLL_ATTEMPTS: u32 = 30;

pub struct GeminiAnnotator {
    cfg: crate::config::Gemini,
    api_key: String,
    http: Client,
}

impl GeminiAnnotator {
    /// Reads the API key from the environment variable named by `gemini.api_key_env`.
    pub fn new(cfg: &Config) -> Result<Self> {
        let api_key = cfg.gemini.api_key()?;
        Self::with_api_key(cfg, api_key)
    }

    pub fn with_api_key(cfg: &Config, api_key: impl Into<String>) -> Result<Self> {
        let timeout = match cfg.gemini.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self {
            cfg: cfg.gemini.clone(),
            api_key: api_key.into(),
            http,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            sanitize_model(&self.cfg.model)
        )
    }

    pub fn build_request(&self, instructions: &str, document: Part) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![
                    Part {
                        text: Some(instructions.to_string()),
                        ..Default::default()
                    },
                    document,
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.cfg.temperature,
                top_p: self.cfg.top_p,
                top_k: self.cfg.top_k,
                max_output_tokens: self.cfg.max_output_tokens,
                response_mime_type: "application/json".into(),
                response_schema: response_schema(),
            },
        }
    }

    fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match build().query(&[("key", self.api_key.as_str())]).send() {
                Ok(resp) => return check_status(resp),
                Err(err) if err.is_connect() && attempt <= self.cfg.connect_retries => {
                    warn!("gemini connect error, retrying (attempt {attempt}): {err}");
                    std::thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
                }
                Err(err) => return Err(err).with_context(|| "gemini request failed"),
            }
        }
    }

    fn generate(&self, request: &GenerateRequest) -> Result<DocumentAnnotation> {
        let url = self.generate_url();
        debug!("gemini generateContent {url}");
        let resp: GenerateResponse = self
            .send(|| self.http.post(&url).json(request))?
            .json()
            .with_context(|| "decoding gemini response")?;
        parse_response(resp)
    }

    fn upload(&self, document: &[u8]) -> Result<UploadedFile> {
        let boundary = format!("----pdf-annotator-{}", &crate::util::sha256_hex(document)[..16]);
        let metadata = serde_json::json!({ "file": { "displayName": "document.pdf" } });

        let mut body = Vec::with_capacity(document.len() + 512);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(serde_json::to_string(&metadata)?.as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {PDF_MIME}\r\n\r\n").as_bytes());
        body.extend_from_slice(document);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let content_type = format!("multipart/related; boundary={boundary}");
        let resp: UploadResponse = self
            .send(|| {
                self.http
                    .post(&self.cfg.upload_url)
                    .header("X-Goog-Upload-Protocol", "multipart")
                    .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                    .body(body.clone())
            })?
            .json()
            .with_context(|| "decoding upload response")?;
        info!("uploaded document as {}", resp.file.name);
        self.wait_active(resp.file)
    }

    fn wait_active(&self, mut file: UploadedFile) -> Result<UploadedFile> {
        let url = self.file_url(&file.name);
        for _ in 0..UPLOAD_POLL_ATTEMPTS {
            match file.state.as_deref() {
                None | Some("ACTIVE") => return Ok(file),
                Some("FAILED") => return Err(anyhow!("uploaded file {} failed processing", file.name)),
                Some(_) => {
                    std::thread::sleep(Duration::from_secs(1));
                    file = self
                        .send(|| self.http.get(&url))?
                        .json()
                        .with_context(|| "decoding file status")?;
                }
            }
        }
        Err(anyhow!("uploaded file {} never became active", file.name))
    }

    fn delete_upload(&self, name: &str) {
        let url = self.file_url(name);
        if let Err(err) = self.send(|| self.http.delete(&url)) {
            warn!("could not delete uploaded file {name}: {err:#}");
        }
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), name)
    }
}

impl Annotator for GeminiAnnotator {
    fn annotate(&self, document: &[u8], instructions: &str) -> Result<DocumentAnnotation> {
        if (document.len() as u64) <= self.cfg.inline_limit_bytes {
            let part = Part {
                inline_data: Some(InlineData {
                    mime_type: PDF_MIME.into(),
                    data: BASE64.encode(document),
                }),
                ..Default::default()
            };
            return self.generate(&self.build_request(instructions, part));
        }

        let file = self.upload(document)?;
        let mime_type = if file.mime_type.is_empty() {
            PDF_MIME.to_string()
        } else {
            file.mime_type.clone()
        };
        let part = Part {
            file_data: Some(FileData {
                mime_type,
                file_uri: file.uri.clone(),
            }),
            ..Default::default()
        };
        let result = self.generate(&self.build_request(instructions, part));
        self.delete_upload(&file.name);
        result
    }
}

fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(anyhow!("gemini returned {status}: {}", body.trim()))
}

/// JSON schema Gemini is asked to follow: four required string fields.
pub fn response_schema() -> serde_json::Value {
    let string = serde_json::json!({ "type": "STRING" });
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "summary": string,
            "keywords": string,
            "title": string,
            "filename": string,
        },
        "required": ["summary", "keywords", "title", "filename"],
        "propertyOrdering": ["summary", "keywords", "title", "filename"],
    })
}

pub fn parse_response(resp: GenerateResponse) -> Result<DocumentAnnotation> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(anyhow!("gemini blocked the prompt: {reason}"));
    }
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("gemini returned no candidates"))?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!(
            "gemini returned an empty candidate (finish_reason={})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }
    serde_json::from_str(strip_fences(&text)).with_context(|| "parsing annotation JSON")
}

fn strip_fences(s: &str) -> &str {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn sanitize_model(model: &str) -> &str {
    model.trim().trim_start_matches("models/")
}
