//! One-shot question

use anyhow::Result;
use tracing::info;

use super::{build_engine, parse_policy};
use crate::engine::parse_confidence;
use crate::Config;

pub async fn run(
    config: &Config,
    query: &str,
    confidence: Option<&str>,
    policy: Option<&str>,
) -> Result<()> {
    let confidence = match confidence {
        Some(level) => parse_confidence(level)?,
        None => config.confidence_level,
    };
    let policy = policy.map(parse_policy).transpose()?;

    let engine = build_engine(config, policy)?;
    info!(%confidence, policy = %engine.settings().policy, "Resolving query");

    let answer = engine.resolve(query, confidence).await;
    println!("{}", answer);
    Ok(())
}
