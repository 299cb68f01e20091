//! Vision-model OCR client.
//!
//! Sends the screenshot as a base64 image block plus the fixed table prompt to
//! the Anthropic Messages API and returns the text of the first reply block.

use super::{TableExtractor, TABLE_PROMPT};
use crate::config::OcrConfig;
use crate::types::{ExtractionError, ExtractionResult, Snapshot};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image { source: ImageSource },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Anthropic Messages API client used as the OCR backend
pub struct VisionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    model: String,
    max_tokens: u32,
}

impl VisionClient {
    /// Build a client from configuration (the API key must already be validated)
    pub fn from_config(config: &OcrConfig) -> Result<Self, ExtractionError> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_http(config, http))
    }

    /// Build a client around an existing HTTP client
    pub fn with_http(config: &OcrConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.as_deref().unwrap_or_default().trim().to_string(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TableExtractor for VisionClient {
    async fn extract_table(&self, snapshot: &Snapshot) -> Result<ExtractionResult, ExtractionError> {
        info!("Analyzing screenshot with {}...", self.model);

        let bytes = tokio::fs::read(&snapshot.path).await?;
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: media_type_for(&snapshot.path),
                            data: STANDARD.encode(&bytes),
                        },
                    },
                    ContentBlock::Text { text: TABLE_PROMPT },
                ],
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ExtractionError::NoContent);
        }

        debug!("OCR returned {} chars", text.len());
        Ok(ExtractionResult { text })
    }
}

/// MIME type for the image block, from the file extension
fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}
