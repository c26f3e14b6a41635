//! Ask a local model for JSON and print the extracted value
//!
//! Run with a local Ollama serving llama3.2:
//! cargo run -p agentforce-core --example structured_output

use agentforce_core::agent::{AgentConfig, AgentForceAgent, OutputFormat};
use agentforce_core::provider::ProviderType;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut agent = AgentForceAgent::new(AgentConfig::new("colors"))
        .use_llm(ProviderType::Ollama, "llama3.2")
        .system_prompt("Reply with a single JSON object inside a ```json fence.")
        .prompt("Give the three primary colors as {\"colors\": [...]}");

    let json = agent.output(OutputFormat::Json).await?;
    println!("{}", json);

    // Same conversation, different format
    let mut agent = agent.prompt("Now the three secondary colors, as YAML.");
    let yaml = agent.output(OutputFormat::Yaml).await?;
    println!("{}", yaml);

    Ok(())
}
