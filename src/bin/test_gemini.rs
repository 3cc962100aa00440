//! Smoke test for the Google Gemini API key.

use dotenvy::dotenv;
use fabrication_bot::integrations::GeminiClient;
use fabrication_bot::providers::{generative_prompt, ConfidenceLevel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env from the project root
    dotenv().ok();

    println!("🔄 Testing Google Gemini API...\n");

    let client = GeminiClient::from_env()?;
    println!("✅ Client created, model: {}\n", client.model());

    println!("📤 Sending: \"Say one word.\"");
    let response = client.chat("Say one word.").await?;
    println!("📥 Reply: {}\n", response);

    println!("📤 Testing with a system prompt...");
    let response = client
        .chat_with_system(
            "What is 2+2?",
            Some("You are a calculator. Answer with numbers only."),
        )
        .await?;
    println!("📥 Reply: {}\n", response);

    println!("📤 Testing the streaming endpoint...");
    let prompt = generative_prompt("What is silicone molding?", ConfidenceLevel::Low);
    let response = client.chat_streamed(&prompt).await?;
    println!("📥 Reply ({} chars): {}\n", response.len(), response);

    println!("✅ All checks passed!");
    Ok(())
}
