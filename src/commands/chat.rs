//! Interactive question loop on stdin.
//!
//! Ctrl-C while a query is running cancels that query only; at the prompt it
//! ends the session.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::build_engine;
use crate::engine::{parse_confidence, INVALID_CONFIDENCE};
use crate::{ConfidenceLevel, Config};

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Quit,
    Confidence(&'a str),
    Query(&'a str),
}

impl<'a> ChatInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("/quit") || trimmed.eq_ignore_ascii_case("/exit") {
            return ChatInput::Quit;
        }
        if let Some(level) = trimmed.strip_prefix("/confidence") {
            return ChatInput::Confidence(level.trim());
        }
        ChatInput::Query(line)
    }
}

pub async fn run(config: &Config, confidence: Option<&str>) -> Result<()> {
    let mut confidence: ConfidenceLevel = match confidence {
        Some(level) => parse_confidence(level)?,
        None => config.confidence_level,
    };
    let engine = build_engine(config, None)?;

    println!("🤖 Soft robotics fabrication assistant");
    println!("   /confidence low|medium|high changes the level of detail, /quit exits\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Quit => break,
            ChatInput::Confidence(level) => match ConfidenceLevel::parse(level) {
                Some(level) => {
                    confidence = level;
                    println!("Confidence level set to {}.\n", level);
                }
                None => println!("{}\n", INVALID_CONFIDENCE),
            },
            ChatInput::Query(query) => {
                tokio::select! {
                    answer = engine.resolve(query, confidence) => println!("{}\n", answer),
                    _ = tokio::signal::ctrl_c() => {
                        info!("Query cancelled");
                        println!("\n(cancelled)\n");
                    }
                }
            }
        }
    }

    println!("👋 Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_queries() {
        assert_eq!(ChatInput::parse(" /quit "), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/EXIT"), ChatInput::Quit);
        assert_eq!(
            ChatInput::parse("/confidence high"),
            ChatInput::Confidence("high")
        );
        assert_eq!(ChatInput::parse("/confidence"), ChatInput::Confidence(""));
        assert_eq!(
            ChatInput::parse("what is casting?"),
            ChatInput::Query("what is casting?")
        );
    }
}
