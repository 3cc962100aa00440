//! Query resolution: local lookup, concurrent provider fan-out and a
//! deterministic merge of whatever came back in time.
//!
//! Provider futures are owned by the resolve future and polled through a
//! [`FuturesUnordered`] set. Nothing is spawned, so dropping a resolve call
//! cancels every request it started.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_PROVIDER_TIMEOUT_MS, OVERALL_TIMEOUT_GRACE_MS};
use crate::error::{Error, Result};
use crate::integrations::{GeminiClient, GoogleSearchClient};
use crate::keywords::{KeywordExtractor, KeywordSet};
use crate::knowledge::KnowledgeStore;
use crate::metrics;
use crate::providers::{
    CallOptions, ConfidenceLevel, GenerativeProvider, Provider, ProviderKind, ProviderResult,
    VideoSuggestionProvider, WebSearchProvider, DEFAULT_WEB_RESULTS,
};

pub const GREETING: &str = "Hello! How may I help you today?";
pub const NO_RESULTS: &str = "No relevant results found.";
pub const EMPTY_QUERY_PROMPT: &str = "Please type a question about soft robotics fabrication.";
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";
pub const INVALID_CONFIDENCE: &str = "Please enter a valid confidence level: low, medium, or high.";

const GREETING_WORDS: [&str; 3] = ["hello", "hi", "hey"];
const SECTION_SEPARATOR: &str = "\n\n";

/// Provider order used by `first_match` when no local record matched.
const FIRST_MATCH_PRIORITY: [ProviderKind; 3] =
    [ProviderKind::Web, ProviderKind::Generative, ProviderKind::Video];

/// Providers consulted one after another by `local_first`.
const LOCAL_FIRST_CASCADE: [ProviderKind; 2] = [ProviderKind::Web, ProviderKind::Generative];

/// How the sources are combined into one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationPolicy {
    /// Every successful source, in merge order.
    #[default]
    ConcatenateAll,
    /// Local records if any, otherwise the best remote answer.
    FirstMatch,
    /// Sequential cascade: local, then web, then generative.
    LocalFirst,
}

impl CombinationPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "concatenate_all" | "all" => Some(CombinationPolicy::ConcatenateAll),
            "first_match" => Some(CombinationPolicy::FirstMatch),
            "local_first" => Some(CombinationPolicy::LocalFirst),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CombinationPolicy::ConcatenateAll => "concatenate_all",
            CombinationPolicy::FirstMatch => "first_match",
            CombinationPolicy::LocalFirst => "local_first",
        }
    }
}

impl fmt::Display for CombinationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a section came from. Variant order is the merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionSource {
    Local,
    Provider(ProviderKind),
}

impl SectionSource {
    pub fn label(&self) -> &'static str {
        match self {
            SectionSource::Local => "Fabrication Methods:",
            SectionSource::Provider(ProviderKind::Generative) => "AI Answer:",
            SectionSource::Provider(ProviderKind::Web) => "Web Results:",
            SectionSource::Provider(ProviderKind::Video) => "Video Suggestions:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub source: SectionSource,
    pub text: String,
}

impl Section {
    pub fn new(source: SectionSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.source.label()
    }

    pub fn render(&self) -> String {
        format!("{}\n{}", self.label(), self.text)
    }
}

/// Successful sections of one answer, kept in merge order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedResponse {
    sections: Vec<Section>,
}

impl AggregatedResponse {
    pub fn from_sections(mut sections: Vec<Section>) -> Self {
        sections.sort_by_key(|s| s.source);
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, source: SectionSource) -> Option<&Section> {
        self.sections.iter().find(|s| s.source == source)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections joined by a blank line, or [`NO_RESULTS`].
    pub fn render(&self) -> String {
        if self.sections.is_empty() {
            return NO_RESULTS.to_string();
        }
        self.sections
            .iter()
            .map(Section::render)
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }
}

/// Structured outcome of a resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Greeting,
    EmptyQuery,
    Answer(AggregatedResponse),
}

impl Resolution {
    pub fn render(&self) -> String {
        match self {
            Resolution::Greeting => GREETING.to_string(),
            Resolution::EmptyQuery => EMPTY_QUERY_PROMPT.to_string(),
            Resolution::Answer(response) => response.render(),
        }
    }

    /// Label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Resolution::Greeting => "greeting",
            Resolution::EmptyQuery => "empty_query",
            Resolution::Answer(response) if response.is_empty() => "no_results",
            Resolution::Answer(_) => "answer",
        }
    }
}

/// State that outlives a single query.
#[derive(Debug, Default)]
pub struct SessionState {
    greeting_answered: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn greeting_answered(&self) -> bool {
        self.greeting_answered.load(Ordering::Acquire)
    }

    /// Flip the flag; `true` only for the caller that flipped it.
    pub fn try_claim_greeting(&self) -> bool {
        self.greeting_answered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

pub fn is_greeting(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();
    GREETING_WORDS.contains(&normalized.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub policy: CombinationPolicy,
    pub confidence: ConfidenceLevel,
    pub provider_timeout: Duration,
    pub overall_timeout: Duration,
    pub max_results: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            policy: CombinationPolicy::default(),
            confidence: ConfidenceLevel::default(),
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            overall_timeout: Duration::from_millis(
                DEFAULT_PROVIDER_TIMEOUT_MS + OVERALL_TIMEOUT_GRACE_MS,
            ),
            max_results: DEFAULT_WEB_RESULTS,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.combination_policy,
            confidence: config.confidence_level,
            provider_timeout: config.provider_timeout(),
            overall_timeout: config.overall_timeout(),
            max_results: config.web_max_results,
        }
    }
}

/// The aggregation engine.
pub struct Engine {
    store: Option<Arc<KnowledgeStore>>,
    extractor: KeywordExtractor,
    providers: Vec<Arc<dyn Provider>>,
    settings: EngineSettings,
    session: SessionState,
    diagnostics: Vec<String>,
}

impl Engine {
    /// Engine with no store and no providers.
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            store: None,
            extractor: KeywordExtractor::new(),
            providers: Vec::new(),
            settings,
            session: SessionState::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<KnowledgeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_extractor(mut self, extractor: KeywordExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_policy(mut self, policy: CombinationPolicy) -> Self {
        self.settings.policy = policy;
        self
    }

    /// Build the engine from configuration.
    ///
    /// A missing dataset or missing credentials disable the affected source
    /// and are reported through [`Engine::diagnostics`]. Only a missing
    /// dataset with `dataset.required` set is an error.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut engine = Self::new(EngineSettings::from_config(config))
            .with_extractor(KeywordExtractor::with_stemming(config.stemming));

        match KnowledgeStore::load_csv(&config.dataset_path) {
            Ok(store) => {
                let store = if config.domain_filter_enabled {
                    store
                        .with_domain_filter(&config.domain_terms)
                        .with_domain_stemming(config.stemming)
                } else {
                    store
                };
                engine.store = Some(Arc::new(store));
            }
            Err(err) if config.dataset_required => return Err(err),
            Err(err) => engine.diagnose(format!("Local dataset unavailable: {}", err)),
        }

        if config.is_enabled(ProviderKind::Web) {
            match GoogleSearchClient::new(&config.google_api_key, &config.search_engine_id) {
                Ok(client) => engine.providers.push(Arc::new(WebSearchProvider::new(client))),
                Err(err) => engine.diagnose(format!("Web search disabled: {}", err)),
            }
        }

        let wants_gemini =
            config.is_enabled(ProviderKind::Generative) || config.is_enabled(ProviderKind::Video);
        if wants_gemini {
            match GeminiClient::new(&config.gemini_api_key, &config.gemini_model) {
                Ok(client) => {
                    let client = client.with_generation(
                        config.gemini_temperature,
                        config.gemini_max_output_tokens,
                    );
                    if config.is_enabled(ProviderKind::Generative) {
                        engine.providers.push(Arc::new(
                            GenerativeProvider::new(client.clone()).streaming(config.gemini_stream),
                        ));
                    }
                    if config.is_enabled(ProviderKind::Video) {
                        engine
                            .providers
                            .push(Arc::new(VideoSuggestionProvider::new(client)));
                    }
                }
                Err(err) => engine.diagnose(format!("Gemini providers disabled: {}", err)),
            }
        }

        info!(
            policy = %engine.settings.policy,
            providers = engine.providers.len(),
            local_records = engine.store.as_ref().map(|s| s.len()).unwrap_or(0),
            "engine ready"
        );
        Ok(engine)
    }

    fn diagnose(&mut self, message: String) {
        warn!("{}", message);
        self.diagnostics.push(message);
    }

    /// Startup problems, reported once.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> Option<&KnowledgeStore> {
        self.store.as_deref()
    }

    pub fn extractor(&self) -> &KeywordExtractor {
        &self.extractor
    }

    pub fn provider_kinds(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Resolve a query into the final response text.
    pub async fn resolve(&self, query: &str, confidence: ConfidenceLevel) -> String {
        self.resolve_response(query, confidence).await.render()
    }

    pub async fn resolve_response(&self, query: &str, confidence: ConfidenceLevel) -> Resolution {
        let started = Instant::now();
        let resolution = self.resolve_inner(query, confidence).await;
        info!(
            policy = %self.settings.policy,
            outcome = resolution.outcome(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query resolved"
        );
        metrics::record_resolve(self.settings.policy.name(), resolution.outcome());
        resolution
    }

    async fn resolve_inner(&self, query: &str, confidence: ConfidenceLevel) -> Resolution {
        if is_greeting(query) && self.session.try_claim_greeting() {
            return Resolution::Greeting;
        }

        let query = query.trim();
        if query.is_empty() {
            return Resolution::EmptyQuery;
        }

        let keywords = self.extractor.extract(query);
        let local = self.local_lookup(&keywords);
        let options = CallOptions {
            confidence,
            max_results: self.settings.max_results,
        };

        let sections = match self.settings.policy {
            CombinationPolicy::ConcatenateAll => {
                let mut sections: Vec<Section> = local.into_iter().collect();
                for (kind, result) in self.fan_out(query, &options).await {
                    if let ProviderResult::Success(text) = result {
                        sections.push(Section::new(SectionSource::Provider(kind), text));
                    }
                }
                sections
            }
            CombinationPolicy::FirstMatch => match local {
                Some(section) => vec![section],
                None => {
                    let results = self.fan_out(query, &options).await;
                    first_success(&results, &FIRST_MATCH_PRIORITY)
                        .into_iter()
                        .collect()
                }
            },
            CombinationPolicy::LocalFirst => match local {
                Some(section) => vec![section],
                None => self.cascade(query, &options).await.into_iter().collect(),
            },
        };

        Resolution::Answer(AggregatedResponse::from_sections(sections))
    }

    fn local_lookup(&self, keywords: &KeywordSet) -> Option<Section> {
        let store = self.store.as_ref()?;
        let text = store.search(keywords)?;
        Some(Section::new(SectionSource::Local, text))
    }

    /// Call every provider concurrently; results come back in provider order.
    async fn fan_out(
        &self,
        query: &str,
        options: &CallOptions,
    ) -> Vec<(ProviderKind, ProviderResult)> {
        if self.providers.is_empty() {
            return Vec::new();
        }

        let mut pending: FuturesUnordered<_> = self
            .providers
            .iter()
            .enumerate()
            .map(|(index, provider)| async move {
                (index, self.call_provider(provider.as_ref(), query, options).await)
            })
            .collect();

        let mut finished: Vec<Option<ProviderResult>> = vec![None; self.providers.len()];
        let deadline = tokio::time::sleep(self.settings.overall_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((index, result)) => finished[index] = Some(result),
                    None => break,
                },
                _ = &mut deadline => {
                    debug!(still_running = pending.len(), "overall deadline reached");
                    break;
                }
            }
        }
        // Cancels whatever is still in flight.
        drop(pending);

        self.providers
            .iter()
            .zip(finished)
            .map(|(provider, result)| {
                let kind = provider.kind();
                let result = result.unwrap_or_else(|| {
                    let result = ProviderResult::Failure(DEADLINE_EXCEEDED.to_string());
                    warn!(provider = %kind, "Provider call cancelled: {}", DEADLINE_EXCEEDED);
                    metrics::record_provider_call(kind, &result, self.settings.overall_timeout);
                    result
                });
                (kind, result)
            })
            .collect()
    }

    /// Consult the cascade providers one at a time until one succeeds.
    async fn cascade(&self, query: &str, options: &CallOptions) -> Option<Section> {
        for kind in LOCAL_FIRST_CASCADE {
            for provider in self.providers.iter().filter(|p| p.kind() == kind) {
                if let ProviderResult::Success(text) =
                    self.call_provider(provider.as_ref(), query, options).await
                {
                    return Some(Section::new(SectionSource::Provider(kind), text));
                }
            }
        }
        None
    }

    async fn call_provider(
        &self,
        provider: &dyn Provider,
        query: &str,
        options: &CallOptions,
    ) -> ProviderResult {
        let kind = provider.kind();
        let started = Instant::now();
        let timeout = self.settings.provider_timeout;

        let result = match tokio::time::timeout(timeout, provider.call(query, options)).await {
            Ok(result) => result,
            Err(_) => ProviderResult::Failure(format!(
                "timed out after {} ms",
                timeout.as_millis()
            )),
        };
        let elapsed = started.elapsed();

        match &result {
            ProviderResult::Failure(reason) => {
                warn!(provider = %kind, %reason, "Provider call failed")
            }
            ProviderResult::Empty => debug!(provider = %kind, "provider returned nothing"),
            ProviderResult::Success(text) => {
                debug!(
                    provider = %kind,
                    chars = text.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "provider answered"
                )
            }
        }
        metrics::record_provider_call(kind, &result, elapsed);
        result
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("local_records", &self.store.as_ref().map(|s| s.len()))
            .field("providers", &self.provider_kinds())
            .field("settings", &self.settings)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

fn first_success(
    results: &[(ProviderKind, ProviderResult)],
    priority: &[ProviderKind],
) -> Option<Section> {
    priority.iter().find_map(|wanted| {
        results
            .iter()
            .filter(|(kind, _)| kind == wanted)
            .find_map(|(kind, result)| {
                let text = result.success_text()?;
                Some(Section::new(SectionSource::Provider(*kind), text))
            })
    })
}

/// Validate a confidence level typed by a user.
pub fn parse_confidence(value: &str) -> Result<ConfidenceLevel> {
    ConfidenceLevel::parse(value)
        .ok_or_else(|| Error::InvalidArgument(INVALID_CONFIDENCE.to_string()))
}
