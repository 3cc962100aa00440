//! External integrations module.
//!
//! Provides clients for:
//! - Google Gemini (generation, streamed generation)
//! - Google Programmable Search (web results)

pub mod gemini;
pub mod google_search;

pub use gemini::GeminiClient;
pub use google_search::{GoogleSearchClient, SearchHit};
