//! Show the keywords extracted from a query

use anyhow::Result;

use crate::{Config, KeywordExtractor};

pub fn run(config: &Config, query: &str) -> Result<()> {
    let extractor = KeywordExtractor::with_stemming(config.stemming);
    let keywords = extractor.extract(query);

    if keywords.is_empty() {
        println!("No keywords found.");
    } else {
        println!("{}", keywords);
    }
    Ok(())
}
