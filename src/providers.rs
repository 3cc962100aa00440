//! Remote knowledge providers behind one uniform contract.
//!
//! Every adapter turns whatever its client returns into a [`ProviderResult`];
//! transport faults, quota errors and bad payloads all end up as
//! `Failure(reason)` and never escape the adapter.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::integrations::{GeminiClient, GoogleSearchClient, SearchHit};

/// Default number of web hits rendered.
pub const DEFAULT_WEB_RESULTS: usize = 3;

/// Remote provider category.
///
/// Variant order is the merge order of the provider sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Generative,
    Web,
    Video,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Generative,
        ProviderKind::Web,
        ProviderKind::Video,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Generative => "generative",
            ProviderKind::Web => "web",
            ProviderKind::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "generative" | "ai" | "gemini" => Some(ProviderKind::Generative),
            "web" | "google" | "search" => Some(ProviderKind::Web),
            "video" | "youtube" => Some(ProviderKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResult {
    Success(String),
    Empty,
    Failure(String),
}

impl ProviderResult {
    /// `Success` for non-blank text, `Empty` otherwise.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            ProviderResult::Empty
        } else {
            ProviderResult::Success(text)
        }
    }

    /// Map a client error onto the result taxonomy.
    pub fn from_error(err: Error) -> Self {
        match err {
            Error::EmptyResponse(_) => ProviderResult::Empty,
            other => ProviderResult::Failure(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProviderResult::Success(_))
    }

    pub fn success_text(&self) -> Option<&str> {
        match self {
            ProviderResult::Success(text) => Some(text),
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProviderResult::Success(_) => "success",
            ProviderResult::Empty => "empty",
            ProviderResult::Failure(_) => "failure",
        }
    }
}

impl From<Result<String>> for ProviderResult {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(text) => ProviderResult::from_text(text),
            Err(err) => ProviderResult::from_error(err),
        }
    }
}

/// How much detail the caller wants from the generative provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(ConfidenceLevel::Low),
            "medium" => Some(ConfidenceLevel::Medium),
            "high" => Some(ConfidenceLevel::High),
            _ => None,
        }
    }

    /// Instruction prepended to the generative prompt.
    pub fn directive(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "Provide a very basic overview.",
            ConfidenceLevel::Medium => "Provide a moderately detailed explanation.",
            ConfidenceLevel::High => "Provide a comprehensive and detailed explanation.",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-call options passed to every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    pub confidence: ConfidenceLevel,
    pub max_results: usize,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            confidence: ConfidenceLevel::default(),
            max_results: DEFAULT_WEB_RESULTS,
        }
    }
}

/// A remote knowledge source.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Look the query up. Must not panic; all faults become `Failure`.
    async fn call(&self, query: &str, options: &CallOptions) -> ProviderResult;
}

/// Web results from Google Programmable Search.
#[derive(Debug, Clone)]
pub struct WebSearchProvider {
    client: GoogleSearchClient,
}

impl WebSearchProvider {
    pub fn new(client: GoogleSearchClient) -> Self {
        Self { client }
    }
}

/// Render hits as `🔗 title: link` lines.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("🔗 {}: {}", hit.title, hit.link))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Provider for WebSearchProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Web
    }

    async fn call(&self, query: &str, options: &CallOptions) -> ProviderResult {
        match self.client.search(query, options.max_results).await {
            Ok(hits) if hits.is_empty() => ProviderResult::Empty,
            Ok(hits) => {
                debug!(hits = hits.len(), "web search hits");
                ProviderResult::Success(format_hits(&hits))
            }
            Err(err) => ProviderResult::from_error(err),
        }
    }
}

/// Generated answer from Gemini, tuned by the confidence level.
#[derive(Debug, Clone)]
pub struct GenerativeProvider {
    client: GeminiClient,
    stream: bool,
}

impl GenerativeProvider {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            stream: false,
        }
    }

    /// Use the streaming endpoint, buffering chunks into one answer.
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Prompt sent to the generative provider.
pub fn generative_prompt(query: &str, confidence: ConfidenceLevel) -> String {
    format!("{} {}", confidence.directive(), query)
}

#[async_trait]
impl Provider for GenerativeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Generative
    }

    async fn call(&self, query: &str, options: &CallOptions) -> ProviderResult {
        let prompt = generative_prompt(query, options.confidence);
        let reply = if self.stream {
            self.client.chat_streamed(&prompt).await
        } else {
            self.client.chat(&prompt).await
        };
        reply.into()
    }
}

/// Video suggestions, produced by asking Gemini for relevant YouTube videos.
#[derive(Debug, Clone)]
pub struct VideoSuggestionProvider {
    client: GeminiClient,
}

impl VideoSuggestionProvider {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

/// Prompt sent for video suggestions.
pub fn video_prompt(query: &str) -> String {
    format!(
        "Search YouTube for videos related to: '{}'. Provide a concise list of 2-3 relevant video titles and their URLs.",
        query
    )
}

#[async_trait]
impl Provider for VideoSuggestionProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Video
    }

    async fn call(&self, query: &str, _options: &CallOptions) -> ProviderResult {
        self.client.chat(&video_prompt(query)).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn from_text_treats_blank_as_empty() {
        assert_eq!(ProviderResult::from_text("  \n"), ProviderResult::Empty);
        assert_eq!(
            ProviderResult::from_text("answer"),
            ProviderResult::Success("answer".to_string())
        );
    }

    #[test]
    fn success_text_containing_error_is_still_success() {
        let result = ProviderResult::from_text("Error handling in soft actuators");
        assert!(result.is_success());
        assert_eq!(result.success_text(), Some("Error handling in soft actuators"));
        assert_eq!(result.outcome(), "success");
    }

    #[test]
    fn from_error_maps_empty_response_to_empty() {
        assert_eq!(
            ProviderResult::from_error(Error::EmptyResponse("Gemini")),
            ProviderResult::Empty
        );
        let failure = ProviderResult::from_error(Error::Http("connection reset".into()));
        assert!(matches!(failure, ProviderResult::Failure(ref r) if r.contains("connection reset")));
    }

    #[test]
    fn confidence_directives() {
        assert_eq!(ConfidenceLevel::parse("LOW"), Some(ConfidenceLevel::Low));
        assert_eq!(ConfidenceLevel::parse("extreme"), None);
        assert_eq!(
            generative_prompt("What is casting?", ConfidenceLevel::High),
            "Provide a comprehensive and detailed explanation. What is casting?"
        );
    }

    #[test]
    fn provider_kind_order_matches_merge_order() {
        let mut kinds = vec![ProviderKind::Video, ProviderKind::Web, ProviderKind::Generative];
        kinds.sort();
        assert_eq!(kinds, ProviderKind::ALL.to_vec());
        assert_eq!(ProviderKind::parse("YouTube"), Some(ProviderKind::Video));
    }

    #[test]
    fn format_hits_renders_links() {
        let hits = vec![
            SearchHit {
                title: "Soft Robotics Toolkit".into(),
                link: "https://softroboticstoolkit.com".into(),
            },
            SearchHit {
                title: "PneuNets".into(),
                link: "https://example.org/pneunets".into(),
            },
        ];
        assert_eq!(
            format_hits(&hits),
            "🔗 Soft Robotics Toolkit: https://softroboticstoolkit.com\n🔗 PneuNets: https://example.org/pneunets"
        );
    }

    #[tokio::test]
    async fn web_provider_converts_transport_error_to_failure() {
        let client = GoogleSearchClient::new("key", "cx")
            .unwrap()
            .with_base_url("http://127.0.0.1:9/customsearch/v1");
        let provider = WebSearchProvider::new(client);

        let result = provider.call("silicone", &CallOptions::default()).await;
        assert!(matches!(result, ProviderResult::Failure(_)));
    }

    #[tokio::test]
    async fn web_provider_reports_empty_on_zero_hits() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!({}));
        });
        let client = GoogleSearchClient::new("key", "cx")
            .unwrap()
            .with_base_url(&server.url("/search"));

        let result = WebSearchProvider::new(client)
            .call("silicone", &CallOptions::default())
            .await;
        assert_eq!(result, ProviderResult::Empty);
    }

    #[tokio::test]
    async fn generative_provider_prepends_directive() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).is_true(|req| {
                let body = String::from_utf8_lossy(req.body().as_ref());
                body.contains("Provide a very basic overview. What is casting?")
            });
            then.status(200).json_body(json!({
                "candidates": [ { "content": { "parts": [ { "text": "Casting pours liquid." } ] } } ]
            }));
        });
        let client = GeminiClient::new("key", "gemini-2.0-flash")
            .unwrap()
            .with_base_url(&server.base_url());

        let options = CallOptions {
            confidence: ConfidenceLevel::Low,
            ..CallOptions::default()
        };
        let result = GenerativeProvider::new(client)
            .call("What is casting?", &options)
            .await;

        assert_eq!(result, ProviderResult::Success("Casting pours liquid.".into()));
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn video_provider_maps_quota_error_to_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST);
            then.status(429).body("RESOURCE_EXHAUSTED");
        });
        let client = GeminiClient::new("key", "gemini-2.0-flash")
            .unwrap()
            .with_base_url(&server.base_url());

        let result = VideoSuggestionProvider::new(client)
            .call("silicone molding", &CallOptions::default())
            .await;
        assert!(matches!(result, ProviderResult::Failure(ref r) if r.contains("429")));
    }
}
