//! Local dataset lookup, without any remote provider.

use anyhow::{Context, Result};

use crate::{Config, KeywordExtractor, KnowledgeStore};

pub fn run(config: &Config, query: &str) -> Result<()> {
    let mut store = KnowledgeStore::load_csv(&config.dataset_path)
        .with_context(|| format!("Cannot read {}", config.dataset_path.display()))?;
    if config.domain_filter_enabled {
        store = store
            .with_domain_filter(&config.domain_terms)
            .with_domain_stemming(config.stemming);
    }

    let keywords = KeywordExtractor::with_stemming(config.stemming).extract(query);
    println!("🔎 Keywords: {}", keywords);

    if !store.is_domain_relevant(&keywords) {
        println!("Query is not about soft robotics fabrication.");
        return Ok(());
    }

    let records = store.matching_records(&keywords);
    println!("📚 {} of {} records match\n", records.len(), store.len());
    for record in records {
        println!("{}\n", record.format_block());
    }
    Ok(())
}
