//! Configuration for the dataset, the providers and the aggregation engine
//!
//! Loads configuration from config.yml file

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::engine::CombinationPolicy;
use crate::error::{Error, Result};
use crate::integrations::gemini::DEFAULT_GEMINI_MODEL;
use crate::keywords::Stemming;
use crate::knowledge::DEFAULT_DOMAIN_TERMS;
use crate::providers::{ConfidenceLevel, ProviderKind, DEFAULT_WEB_RESULTS};

/// Default constants (fallback if config.yml not found)
pub const CONFIG_FILE: &str = "config.yml";
pub const DATASET_PATH: &str = "expanded_soft_robotics_fabrication_methods.csv";
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 15_000;
/// Extra time the overall deadline allows on top of the provider timeout.
pub const OVERALL_TIMEOUT_GRACE_MS: u64 = 500;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    dataset: Option<DatasetConfig>,
    keywords: Option<KeywordsConfig>,
    engine: Option<EngineConfig>,
    google: Option<GoogleConfig>,
    gemini: Option<GeminiConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetConfig {
    path: Option<String>,
    required: Option<bool>,
    domain_filter: Option<bool>,
    domain_terms: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct KeywordsConfig {
    stemming: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EngineConfig {
    combination_policy: Option<String>,
    confidence_level: Option<String>,
    provider_timeout_ms: Option<u64>,
    overall_timeout_ms: Option<u64>,
    enabled_providers: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleConfig {
    api_key: Option<String>,
    search_engine_id: Option<String>,
    max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiConfig {
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    stream: Option<bool>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub dataset_required: bool,
    pub domain_filter_enabled: bool,
    pub domain_terms: Vec<String>,
    pub stemming: Stemming,
    pub combination_policy: CombinationPolicy,
    pub confidence_level: ConfidenceLevel,
    pub provider_timeout_ms: u64,
    pub overall_timeout_ms: Option<u64>,
    pub enabled_providers: BTreeSet<ProviderKind>,
    pub web_max_results: usize,
    pub google_api_key: String,
    pub search_engine_id: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_temperature: f32,
    pub gemini_max_output_tokens: u32,
    pub gemini_stream: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or fall back to defaults.
    /// Environment variables take precedence over config.yml values for secrets.
    pub fn new() -> Self {
        Self::load_from_file(CONFIG_FILE)
            .or_else(|_| Self::load_from_file(format!("../{}", CONFIG_FILE)))
            .unwrap_or_else(|err| {
                warn!("Using default configuration: {}", err);
                Self::load_dotenv();
                Self::from_yaml(YamlConfig::default())
            })
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        // If value from YAML looks like ${...}, try env var
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                // Extract var name from ${VAR_NAME}
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return env_val;
                }
                return std::env::var(env_key).unwrap_or_default();
            }
        }
        // Also check explicit env_key as fallback
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        value.unwrap_or_default()
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        // Try to load from current directory first, then parent
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Load .env file first
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::from_yaml(YamlConfig::default()));
        }
        let yaml: YamlConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let dataset = yaml.dataset.unwrap_or_default();
        let keywords = yaml.keywords.unwrap_or_default();
        let engine = yaml.engine.unwrap_or_default();
        let google = yaml.google.unwrap_or_default();
        let gemini = yaml.gemini.unwrap_or_default();
        let defaults = Self::defaults();

        let stemming = parse_or_default(keywords.stemming, "keywords.stemming", Stemming::parse);
        let combination_policy = parse_or_default(
            engine.combination_policy,
            "engine.combination_policy",
            CombinationPolicy::parse,
        );
        let confidence_level = parse_or_default(
            engine.confidence_level,
            "engine.confidence_level",
            ConfidenceLevel::parse,
        );

        let enabled_providers = match engine.enabled_providers {
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let kind = ProviderKind::parse(name);
                    if kind.is_none() {
                        warn!(provider = %name, "Ignoring unknown provider in engine.enabled_providers");
                    }
                    kind
                })
                .collect(),
            None => defaults.enabled_providers.clone(),
        };

        let dataset_path = Self::resolve_env_string(dataset.path, "FABRICATION_DATASET");
        let google_api_key = Self::resolve_env_string(google.api_key, "GOOGLE_API_KEY");
        let search_engine_id =
            Self::resolve_env_string(google.search_engine_id, "GOOGLE_SEARCH_ENGINE_ID");
        let mut gemini_api_key = Self::resolve_env_string(gemini.api_key, "GEMINI_API_KEY");
        if gemini_api_key.is_empty() {
            // One Google key usually covers both services.
            gemini_api_key = google_api_key.clone();
        }

        Self {
            dataset_path: if dataset_path.is_empty() {
                defaults.dataset_path
            } else {
                PathBuf::from(dataset_path)
            },
            dataset_required: dataset.required.unwrap_or(defaults.dataset_required),
            domain_filter_enabled: dataset.domain_filter.unwrap_or(defaults.domain_filter_enabled),
            domain_terms: dataset.domain_terms.unwrap_or(defaults.domain_terms),
            stemming,
            combination_policy,
            confidence_level,
            provider_timeout_ms: engine
                .provider_timeout_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.provider_timeout_ms),
            overall_timeout_ms: engine.overall_timeout_ms.filter(|ms| *ms > 0),
            enabled_providers,
            web_max_results: google
                .max_results
                .filter(|n| *n > 0)
                .unwrap_or(defaults.web_max_results),
            google_api_key,
            search_engine_id,
            gemini_api_key,
            gemini_model: gemini.model.unwrap_or(defaults.gemini_model),
            gemini_temperature: gemini.temperature.unwrap_or(defaults.gemini_temperature),
            gemini_max_output_tokens: gemini
                .max_output_tokens
                .unwrap_or(defaults.gemini_max_output_tokens),
            gemini_stream: gemini.stream.unwrap_or(defaults.gemini_stream),
        }
    }

    /// Create config with empty credentials (fallback)
    pub fn defaults() -> Self {
        Self {
            dataset_path: PathBuf::from(DATASET_PATH),
            dataset_required: false,
            domain_filter_enabled: true,
            domain_terms: DEFAULT_DOMAIN_TERMS.iter().map(|t| t.to_string()).collect(),
            stemming: Stemming::Exact,
            combination_policy: CombinationPolicy::ConcatenateAll,
            confidence_level: ConfidenceLevel::Medium,
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            overall_timeout_ms: None,
            enabled_providers: ProviderKind::ALL.into_iter().collect(),
            web_max_results: DEFAULT_WEB_RESULTS,
            google_api_key: String::new(),
            search_engine_id: String::new(),
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_temperature: 0.7,
            gemini_max_output_tokens: 4096,
            gemini_stream: false,
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    /// Overall resolve deadline; defaults to the provider timeout plus a grace period.
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(
            self.overall_timeout_ms
                .unwrap_or(self.provider_timeout_ms.saturating_add(OVERALL_TIMEOUT_GRACE_MS)),
        )
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.enabled_providers.contains(&kind)
    }
}

fn parse_or_default<T: Default>(
    value: Option<String>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    match value {
        Some(raw) => parse(&raw).unwrap_or_else(|| {
            warn!(%field, value = %raw, "Unrecognized value, using default");
            T::default()
        }),
        None => T::default(),
    }
}
