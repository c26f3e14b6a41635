//! Serve an agent over HTTP
//!
//! Run with a local Ollama, then:
//! curl -X POST localhost:3000/summarize -H 'content-type: application/json' \
//!      -d '{"prompt": "Summarize: Rust is a systems language.", "output": "json"}'

use std::net::SocketAddr;

use agentforce_core::agent::{AgentConfig, AgentForceAgent};
use agentforce_core::provider::ProviderType;
use agentforce_core::server::{AgentServer, Method};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = "127.0.0.1:3000".parse()?;

    AgentServer::new("demo")
        .add_route_agent(Method::POST, "/summarize", || {
            AgentForceAgent::new(AgentConfig::new("summarizer"))
                .use_llm(ProviderType::Ollama, "llama3.2")
                .system_prompt("Summarize the user's text in one sentence.")
        })
        .serve(addr)
        .await?;

    Ok(())
}
