mod response;
mod retry;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::{debug, info};

use crate::settings::VisionSettings;
use response::BatchAnnotateImagesResponse;
use retry::{
    RETRY_BASE_DELAY, is_transient_error, is_transient_status, retry_after, wait_with_backoff,
};

pub use response::{Block, BoundingPoly, OcrWord, Page, Paragraph, Symbol, TextAnnotation, Vertex};

pub const FEATURE_DOCUMENT_TEXT_DETECTION: &str = "DOCUMENT_TEXT_DETECTION";
const API_KEY_ENVS: [&str; 2] = ["GOOGLE_CLOUD_VISION_API_KEY", "GOOGLE_API_KEY"];

/// A parsed annotation together with the body it was decoded from.
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    pub raw: String,
    pub annotation: TextAnnotation,
}

pub type DetectFuture<'a> = Pin<Box<dyn Future<Output = Result<DetectionOutput>> + Send + 'a>>;

pub trait TextDetector: Send + Sync {
    fn detect_document_text<'a>(&'a self, image_bytes: &'a [u8]) -> DetectFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    key: String,
    settings: VisionSettings,
}

impl VisionClient {
    pub fn new(key: impl Into<String>, settings: VisionSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .with_context(|| "failed to build HTTP client")?;
        Ok(Self {
            http,
            key: key.into(),
            settings,
        })
    }

    async fn annotate(&self, image_bytes: &[u8]) -> Result<DetectionOutput> {
        let body = build_request_body(image_bytes, &self.settings.language_hints);
        let max_retries = self.settings.max_retries;

        let mut attempt = 0usize;
        let mut delay = RETRY_BASE_DELAY;
        loop {
            attempt += 1;
            debug!(
                "sending {} request to {} (attempt {})",
                FEATURE_DOCUMENT_TEXT_DETECTION, self.settings.endpoint, attempt
            );
            let sent = self
                .http
                .post(&self.settings.endpoint)
                .header("x-goog-api-key", self.key.as_str())
                .json(&body)
                .send()
                .await;
            let response = match sent {
                Ok(response) => response,
                Err(err) if is_transient_error(&err) && attempt <= max_retries => {
                    delay = wait_with_backoff("request failed", attempt, max_retries, delay, None)
                        .await;
                    continue;
                }
                Err(err) => {
                    return Err(anyhow!(err).context("Cloud Vision request failed"));
                }
            };

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response
                .text()
                .await
                .with_context(|| "failed to read Cloud Vision response body")?;
            if status.is_success() {
                let annotation = parse_annotate_response(&text)?;
                return Ok(DetectionOutput {
                    raw: text,
                    annotation,
                });
            }
            if is_transient_status(status, &text) && attempt <= max_retries {
                delay = wait_with_backoff(
                    &format!("returned {}", status),
                    attempt,
                    max_retries,
                    delay,
                    retry_after,
                )
                .await;
                continue;
            }
            return Err(anyhow!(
                "Cloud Vision API error ({}): {}",
                status,
                extract_vision_error(&text).unwrap_or(text)
            ));
        }
    }
}

impl TextDetector for VisionClient {
    fn detect_document_text<'a>(&'a self, image_bytes: &'a [u8]) -> DetectFuture<'a> {
        Box::pin(self.annotate(image_bytes))
    }
}

/// Replays an `images:annotate` response saved by an earlier run.
#[derive(Debug, Clone)]
pub struct SavedResponse {
    path: PathBuf,
}

impl SavedResponse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TextDetector for SavedResponse {
    fn detect_document_text<'a>(&'a self, _image_bytes: &'a [u8]) -> DetectFuture<'a> {
        Box::pin(async move {
            let raw = std::fs::read_to_string(&self.path).with_context(|| {
                format!("failed to read saved response: {}", self.path.display())
            })?;
            let annotation = parse_annotate_response(&raw)
                .with_context(|| format!("invalid saved response: {}", self.path.display()))?;
            info!("loaded saved response from {}", self.path.display());
            Ok(DetectionOutput { raw, annotation })
        })
    }
}

pub fn resolve_key(override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key.filter(|key| !key.trim().is_empty()) {
        return Ok(key.to_string());
    }
    API_KEY_ENVS
        .iter()
        .find_map(|name| get_env(name))
        .ok_or_else(|| {
            anyhow!(
                "Cloud Vision API key not found (pass --key or set {})",
                API_KEY_ENVS.join(" / ")
            )
        })
}

pub fn build_request_body(image_bytes: &[u8], language_hints: &[String]) -> Value {
    json!({
        "requests": [
            {
                "image": { "content": BASE64.encode(image_bytes) },
                "features": [ { "type": FEATURE_DOCUMENT_TEXT_DETECTION } ],
                "imageContext": {
                    "languageHints": language_hints,
                    "textDetectionParams": {
                        "enableTextDetectionConfidenceScore": true
                    }
                }
            }
        ]
    })
}

pub fn parse_annotate_response(text: &str) -> Result<TextAnnotation> {
    let payload: BatchAnnotateImagesResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Cloud Vision response JSON: {}", err))?;
    let response = payload
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no response returned from Cloud Vision"))?;
    if let Some(error) = response.error {
        return Err(anyhow!(
            "Cloud Vision annotate error: {}",
            format_error_parts(error.message, None, error.code.map(|code| code.to_string()))
        ));
    }
    match response.full_text_annotation {
        Some(annotation) => Ok(annotation),
        None => {
            info!("Cloud Vision detected no text");
            Ok(TextAnnotation::default())
        }
    }
}

pub fn save_raw_response(path: &Path, raw: &str) -> Result<()> {
    std::fs::write(path, raw)
        .with_context(|| format!("failed to write response dump: {}", path.display()))
}

fn extract_vision_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<VisionError>,
    }

    #[derive(Deserialize)]
    struct VisionError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i32>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(
        error.message,
        error.status,
        error.code.map(|value| value.to_string()),
    ))
}

fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("status: {}", kind));
    }
    if let Some(code) = code
        && !code.trim().is_empty()
    {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
