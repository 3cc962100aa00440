//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod ask;
pub mod chat;
pub mod keywords;
pub mod lookup;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::{CombinationPolicy, Config, Engine};

/// Load configuration from `path`, falling back to the default search when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    } else {
        warn!(path = %path.display(), "Config file not found");
        Ok(Config::new())
    }
}

/// Parse a `--policy` value.
pub fn parse_policy(value: &str) -> Result<CombinationPolicy> {
    CombinationPolicy::parse(value).with_context(|| {
        format!(
            "Unknown combination policy '{}': expected concatenate_all, first_match or local_first",
            value
        )
    })
}

/// Build the engine and print its startup diagnostics once.
pub fn build_engine(config: &Config, policy: Option<CombinationPolicy>) -> Result<Engine> {
    let mut engine = Engine::from_config(config)?;
    if let Some(policy) = policy {
        engine = engine.with_policy(policy);
    }
    for diagnostic in engine.diagnostics() {
        eprintln!("⚠️  {}", diagnostic);
    }
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_policy_rejects_unknown_names() {
        assert_eq!(
            parse_policy("first_match").unwrap(),
            CombinationPolicy::FirstMatch
        );
        let err = parse_policy("round_robin").unwrap_err();
        assert!(err.to_string().contains("round_robin"));
    }

    #[test]
    fn ask_runs_without_dataset_or_credentials() {
        let mut config = Config::defaults();
        config.dataset_path = "/nonexistent/methods.csv".into();

        let result = tokio_test::block_on(ask::run(&config, "silicone casting", Some("low"), None));
        assert!(result.is_ok());
    }

    #[test]
    fn ask_rejects_invalid_confidence() {
        let config = Config::defaults();
        let err = tokio_test::block_on(ask::run(&config, "casting", Some("extreme"), None))
            .unwrap_err();
        assert!(err.to_string().contains("low, medium, or high"));
    }

    #[test]
    fn load_config_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "engine:\n  combination_policy: local_first\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.combination_policy, CombinationPolicy::LocalFirst);
    }
}
