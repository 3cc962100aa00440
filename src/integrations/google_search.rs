//! Google Programmable Search (Custom Search JSON API) client.

use reqwest::Client;
use serde::Deserialize;

use crate::{Error, Result};

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// The API never returns more than 10 items per page.
const MAX_PAGE_SIZE: usize = 10;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
}

/// Google Custom Search client.
#[derive(Debug, Clone)]
pub struct GoogleSearchClient {
    http: Client,
    api_key: String,
    search_engine_id: String,
    base_url: String,
}

impl GoogleSearchClient {
    pub fn new<K: Into<String>, C: Into<String>>(api_key: K, search_engine_id: C) -> Result<Self> {
        let api_key = api_key.into();
        let search_engine_id = search_engine_id.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("GOOGLE_API_KEY is empty".to_string()));
        }
        if search_engine_id.trim().is_empty() {
            return Err(Error::Config("search engine id is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("fabrication_bot/0.1.0")
            .build()
            .map_err(|e| Error::Http(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            search_engine_id,
            base_url: CUSTOM_SEARCH_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Search and return at most `max_results` hits, in provider order.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let num = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.search_engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("Google Search request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::ProviderStatus {
                provider: "Google Search",
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&text).map_err(|e| {
            Error::SerializationError(format!("Invalid Google Search response: {}", e))
        })?;

        Ok(parsed.items.into_iter().take(max_results).collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}
