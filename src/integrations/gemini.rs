//! Google Gemini API Client.
//!
//! Supports:
//! - Gemini 2.0/2.5 Flash and Pro
//! - Single-shot `generateContent`
//! - Streaming `streamGenerateContent` (SSE), buffered into one answer

use std::env;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Google Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Create a client from GEMINI_API_KEY, falling back to GOOGLE_API_KEY.
    pub fn from_env() -> Result<Self> {
        let gemini_key = env::var("GEMINI_API_KEY").ok();
        let google_key = env::var("GOOGLE_API_KEY").ok();
        let api_key = pick_api_key(gemini_key, google_key).ok_or_else(|| {
            Error::Config("neither GEMINI_API_KEY nor GOOGLE_API_KEY is set".to_string())
        })?;
        Self::new(api_key, DEFAULT_GEMINI_MODEL)
    }

    /// Create a client with an API key and model.
    pub fn new<S: Into<String>>(api_key: S, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("GOOGLE_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("fabrication_bot/0.1.0")
            .build()
            .map_err(|e| Error::Http(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: model.to_string(),
            temperature: 0.7,
            max_output_tokens: 4096,
        })
    }

    /// Set the model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Override sampling parameters.
    pub fn with_generation(mut self, temperature: f32, max_output_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Point the client at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Simple chat: send one prompt and return the generated text.
    pub async fn chat(&self, message: &str) -> Result<String> {
        self.chat_with_system(message, None).await
    }

    /// Chat with a system instruction.
    pub async fn chat_with_system(&self, message: &str, system: Option<&str>) -> Result<String> {
        let payload = self.request(message, system);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::ProviderStatus {
                provider: "Gemini",
                status: status.as_u16(),
                body: text,
            });
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            Error::SerializationError(format!("Invalid Gemini response: {} - {}", e, text))
        })?;

        gemini_response
            .text()
            .ok_or(Error::EmptyResponse("Gemini"))
    }

    /// Streamed chat. Chunks are buffered until the stream ends.
    pub async fn chat_streamed(&self, message: &str) -> Result<String> {
        let payload = self.request(message, None);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ProviderStatus {
                provider: "Gemini",
                status: status.as_u16(),
                body,
            });
        }

        let mut events = response.bytes_stream().eventsource();
        let mut answer = String::new();
        let mut chunks = 0usize;

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| Error::Http(format!("Gemini stream failed: {}", e)))?;
            if let Some(text) = parse_event_data(&event.data)? {
                chunks += 1;
                answer.push_str(&text);
            }
        }

        debug!(chunks, chars = answer.len(), "Gemini stream finished");
        if answer.trim().is_empty() {
            return Err(Error::EmptyResponse("Gemini"));
        }
        Ok(answer)
    }

    fn request(&self, message: &str, system: Option<&str>) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: message.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            }),
            system_instruction: system.map(|sys| SystemInstruction {
                parts: vec![Part {
                    text: sys.to_string(),
                }],
            }),
        }
    }
}

/// First non-blank key, Gemini-specific one first.
fn pick_api_key(gemini: Option<String>, google: Option<String>) -> Option<String> {
    [gemini, google]
        .into_iter()
        .flatten()
        .find(|key| !key.trim().is_empty())
}

/// Extract the text carried by one SSE event payload.
fn parse_event_data(data: &str) -> Result<Option<String>> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    let chunk: GeminiResponse = serde_json::from_str(data)?;
    Ok(chunk.text())
}

// === Request structures ===

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemInstruction")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

// === Response structures ===

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, `None` when blank.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
