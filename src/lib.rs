//! Soft-robotics fabrication assistant library
//!
//! This library provides tools to:
//! - Extract search keywords from free-text questions
//! - Look fabrication methods up in a local CSV dataset
//! - Query web search, Gemini and video suggestion providers concurrently
//! - Merge every answer into one deterministic response

pub mod config;
pub mod engine;
pub mod error;
pub mod integrations;
pub mod keywords;
pub mod knowledge;
pub mod metrics;
pub mod providers;

// Re-export common types
pub use config::Config;
pub use engine::{
    AggregatedResponse, CombinationPolicy, Engine, EngineSettings, Resolution, Section,
    SectionSource, SessionState,
};
pub use error::{Error, Result};
pub use integrations::{GeminiClient, GoogleSearchClient};
pub use keywords::{KeywordExtractor, KeywordSet, Stemming};
pub use knowledge::{KnowledgeStore, Record};
pub use providers::{CallOptions, ConfidenceLevel, Provider, ProviderKind, ProviderResult};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
