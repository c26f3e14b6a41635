//! Agent builder
//!
//! [`AgentForceAgent`] collects a provider choice, prompts, tools and MCP
//! servers through chained calls, then runs one exchange with the model:
//!
//! ```no_run
//! # async fn demo() -> agentforce_core::Result<()> {
//! use agentforce_core::agent::{AgentConfig, AgentForceAgent, OutputFormat};
//! use agentforce_core::provider::ProviderType;
//!
//! let mut agent = AgentForceAgent::new(AgentConfig::new("summarizer"))
//!     .use_llm(ProviderType::Ollama, "llama3.2")
//!     .system_prompt("Answer in JSON.")
//!     .prompt("List three primary colors");
//! let json = agent.output(OutputFormat::Json).await?;
//! # Ok(())
//! # }
//! ```

pub mod output;
pub mod tool_loop;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, ProviderConfig};
use crate::error::{Error, Result};
use crate::formatting::HtmlFilterConfig;
use crate::mcp_manager::McpServerManager;
use crate::provider::{ChatProvider, GenAIProvider, InteractionLog, LlmMessage, ModelSettings, ProviderType};
use crate::tools::mcp::McpToolWrapper;
use crate::tools::{Tool, ToolRegistry, builtin_tool};

pub use output::{OutputFormat, render};
pub use tool_loop::{LoopOutcome, ToolLoop, parse_fenced_tool_calls};

/// Static description of an agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Built-in tool names, e.g. `fs_read_file`
    pub tools: Vec<String>,
    /// MCP server names from the `[mcp_servers]` config section
    pub mcps: Vec<String>,
    /// Root for the filesystem tools; falls back to config, then the cwd
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_rounds: Option<usize>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Result of [`AgentForceAgent::run`]
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final assistant text
    pub response: String,
    /// Full conversation of this run, tool traffic included
    pub messages: Vec<LlmMessage>,
    pub tool_rounds: usize,
    pub tool_calls: usize,
}

/// Fluent agent builder
pub struct AgentForceAgent {
    config: AgentConfig,
    app_config: Config,
    provider_type: Option<ProviderType>,
    model: Option<String>,
    provider: Option<Arc<dyn ChatProvider>>,
    system_prompt: String,
    templates: Vec<PathBuf>,
    prompt: String,
    model_settings: Option<ModelSettings>,
    debug: bool,
    html_filter: HtmlFilterConfig,
    mcp_manager: Option<Arc<McpServerManager>>,
    history: Vec<LlmMessage>,
}

impl AgentForceAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            app_config: Config::default(),
            provider_type: None,
            model: None,
            provider: None,
            system_prompt: String::new(),
            templates: Vec::new(),
            prompt: String::new(),
            model_settings: None,
            debug: false,
            html_filter: HtmlFilterConfig::default(),
            mcp_manager: None,
            history: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Application config supplying API keys, MCP servers and defaults
    pub fn with_config(mut self, config: Config) -> Self {
        self.app_config = config;
        self
    }

    /// Choose the provider and model
    pub fn use_llm(mut self, provider: ProviderType, model: impl Into<String>) -> Self {
        self.provider_type = Some(provider);
        self.model = Some(model.into()).filter(|m: &String| !m.is_empty());
        self.provider = None;
        self
    }

    /// Use an already-built provider instead of resolving one from config
    pub fn with_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = text.into();
        self
    }

    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = text.into();
        self
    }

    /// Append a template file to the system prompt; read when the agent runs
    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.templates.push(path.into());
        self
    }

    pub fn with_model_config(mut self, settings: ModelSettings) -> Self {
        self.model_settings = Some(settings);
        self
    }

    /// Log prompts and replies at info level
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tools.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_mcp<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.mcps.extend(names.into_iter().map(Into::into));
        self
    }

    /// Share a manager whose servers may already be running
    pub fn with_mcp_manager(mut self, manager: Arc<McpServerManager>) -> Self {
        self.mcp_manager = Some(manager);
        self
    }

    /// Filter applied when rendering [`OutputFormat::Html`]
    pub fn with_html_filter(mut self, filter: HtmlFilterConfig) -> Self {
        self.html_filter = filter;
        self
    }

    /// Prior user/assistant turns, oldest first
    pub fn history(&self) -> &[LlmMessage] {
        &self.history
    }

    /// Send the prompt and run the tool loop to completion
    pub async fn run(&mut self) -> Result<AgentRun> {
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(Error::Agent(format!(
                "Agent '{}' has no prompt; call .prompt() first",
                self.config.name
            )));
        }

        let (provider, settings) = self.resolve_provider()?;
        let system = self.compose_system_prompt().await?;
        let registry = self.build_registry().await?;

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if !system.is_empty() {
            messages.push(LlmMessage::system(system));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(LlmMessage::user(prompt.clone()));

        if self.debug {
            info!(
                agent = %self.config.name,
                provider = provider.name(),
                model = provider.model(),
                tools = registry.len(),
                prompt = %prompt,
                "Running agent"
            );
        } else {
            debug!(agent = %self.config.name, provider = provider.name(), "Running agent");
        }

        let max_rounds = self
            .config
            .max_tool_rounds
            .unwrap_or(self.app_config.general.max_tool_rounds);
        let outcome = ToolLoop::new(provider.as_ref(), &registry)
            .with_settings(settings)
            .with_max_rounds(max_rounds)
            .run(&mut messages)
            .await?;

        if self.debug {
            info!(
                agent = %self.config.name,
                rounds = outcome.rounds,
                response = %outcome.response,
                "Agent finished"
            );
        }

        self.history.push(LlmMessage::user(prompt));
        self.history.push(LlmMessage::assistant(outcome.response.clone()));

        Ok(AgentRun {
            response: outcome.response,
            messages,
            tool_rounds: outcome.rounds,
            tool_calls: outcome.tool_calls,
        })
    }

    /// Run and render the reply as `format`
    pub async fn output(&mut self, format: OutputFormat) -> Result<String> {
        let run = self.run().await?;
        Ok(render(&run.response, format, &self.html_filter))
    }

    /// Run, render by file extension, and write the result to `path`
    pub async fn save(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let format = OutputFormat::from_path(path);
        let content = self.output(format).await?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &content).await?;
        info!(path = %path.display(), format = format.as_str(), "Saved agent output");

        Ok(content)
    }

    fn resolve_provider(&self) -> Result<(Arc<dyn ChatProvider>, ModelSettings)> {
        if let Some(provider) = &self.provider {
            return Ok((provider.clone(), self.model_settings.unwrap_or_default()));
        }

        let provider_type = match self.provider_type {
            Some(provider_type) => provider_type,
            None => self
                .app_config
                .default_provider
                .parse::<ProviderType>()
                .map_err(Error::Provider)?,
        };
        let provider_config = self
            .app_config
            .provider_for(provider_type)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::for_type(provider_type));

        let model = self.model.as_deref().unwrap_or(&provider_config.model);
        let api_key = provider_config.get_api_key();
        if provider_type.requires_api_key() && api_key.is_none() {
            return Err(Error::Provider(format!(
                "No API key for {}; set {}",
                provider_type,
                provider_type.api_key_env().unwrap_or("an api_key in the config")
            )));
        }

        let mut provider = GenAIProvider::with_config(
            provider_type,
            api_key.as_deref(),
            Some(model),
            provider_config.base_url.as_deref(),
        );
        if let Some(log_path) = &self.app_config.general.interaction_log {
            provider = provider.with_interaction_log(InteractionLog::new(log_path.clone()));
        }

        let settings = self
            .model_settings
            .unwrap_or_else(|| provider_config.model_settings());
        Ok((Arc::new(provider), settings))
    }

    async fn compose_system_prompt(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(self.templates.len() + 1);
        if !self.system_prompt.trim().is_empty() {
            parts.push(self.system_prompt.trim().to_string());
        }
        for template in &self.templates {
            let text = tokio::fs::read_to_string(template).await.map_err(|e| {
                Error::Agent(format!("Failed to read template {}: {}", template.display(), e))
            })?;
            if !text.trim().is_empty() {
                parts.push(text.trim().to_string());
            }
        }
        Ok(parts.join("\n\n"))
    }

    fn workspace(&self) -> Result<PathBuf> {
        match self
            .config
            .workspace
            .clone()
            .or_else(|| self.app_config.general.workspace.clone())
        {
            Some(path) => Ok(path),
            None => Ok(std::env::current_dir()?),
        }
    }

    async fn build_registry(&mut self) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();

        if !self.config.tools.is_empty() {
            let workspace = self.workspace()?;
            for name in &self.config.tools {
                let tool = builtin_tool(name, &workspace)
                    .ok_or_else(|| Error::Agent(format!("Unknown tool: {}", name)))?;
                registry.register(tool);
            }
        }

        if !self.config.mcps.is_empty() {
            let manager = self.mcp_manager()?;
            manager.start_named(&self.config.mcps).await?;
            for server in &self.config.mcps {
                for info in manager.get_server_tools(server).await.unwrap_or_default() {
                    let tool: Arc<dyn Tool> = Arc::new(McpToolWrapper::new(info, manager.clone()));
                    registry.register(tool);
                }
            }
        }

        Ok(registry)
    }

    /// The shared manager, or one built from the configured servers this agent names
    fn mcp_manager(&mut self) -> Result<Arc<McpServerManager>> {
        if let Some(manager) = &self.mcp_manager {
            return Ok(manager.clone());
        }

        let mut configs = std::collections::HashMap::new();
        for name in &self.config.mcps {
            let server = self
                .app_config
                .get_mcp_server(name)
                .ok_or_else(|| Error::Mcp(format!("MCP server '{}' is not configured", name)))?;
            configs.insert(name.clone(), server.clone());
        }

        let manager = Arc::new(McpServerManager::with_configs(configs));
        self.mcp_manager = Some(manager.clone());
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CompletionResult;
    use crate::tools::ToolDefinition;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with canned text and records the conversation it saw
    struct EchoProvider {
        reply: String,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl EchoProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn chat(
            &self,
            messages: &[LlmMessage],
            _tools: &[ToolDefinition],
            _settings: &ModelSettings,
        ) -> Result<CompletionResult> {
            let transcript = messages
                .iter()
                .map(|m| format!("{}: {}", m.role_name(), m.content_as_text()))
                .collect();
            self.seen.lock().unwrap().push(transcript);
            Ok(CompletionResult::text(self.reply.clone()))
        }
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let mut agent = AgentForceAgent::new(AgentConfig::new("quiet")).with_provider(EchoProvider::new("hi"));
        assert!(matches!(agent.run().await, Err(Error::Agent(_))));

        let mut agent = agent.prompt("   ");
        assert!(matches!(agent.run().await, Err(Error::Agent(_))));
    }

    #[tokio::test]
    async fn test_run_sends_system_and_prompt() {
        let provider = EchoProvider::new("Paris");
        let mut agent = AgentForceAgent::new(AgentConfig::new("geo"))
            .with_provider(provider.clone())
            .system_prompt("You know geography.")
            .prompt("Capital of France?");

        let run = agent.run().await.unwrap();
        assert_eq!(run.response, "Paris");
        assert_eq!(run.tool_rounds, 0);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            vec![
                "system: You know geography.".to_string(),
                "user: Capital of France?".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_carries_over() {
        let provider = EchoProvider::new("ok");
        let mut agent = AgentForceAgent::new(AgentConfig::new("chat"))
            .with_provider(provider.clone())
            .prompt("first");
        agent.run().await.unwrap();

        let mut agent = agent.prompt("second");
        agent.run().await.unwrap();

        assert_eq!(agent.history().len(), 4);
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[1], vec!["user: first", "assistant: ok", "user: second"]);
    }

    #[tokio::test]
    async fn test_template_appended_to_system_prompt() {
        let dir = tempfile::TempDir::new().unwrap();
        let template = dir.path().join("persona.md");
        std::fs::write(&template, "Be brief.\n").unwrap();

        let provider = EchoProvider::new("ok");
        let mut agent = AgentForceAgent::new(AgentConfig::new("t"))
            .with_provider(provider.clone())
            .system_prompt("Base.")
            .with_template(&template)
            .prompt("go");
        agent.run().await.unwrap();

        assert_eq!(provider.seen.lock().unwrap()[0][0], "system: Base.\n\nBe brief.");
    }

    #[tokio::test]
    async fn test_missing_template_fails() {
        let mut agent = AgentForceAgent::new(AgentConfig::new("t"))
            .with_provider(EchoProvider::new("ok"))
            .with_template("/definitely/not/here.md")
            .prompt("go");
        assert!(matches!(agent.run().await, Err(Error::Agent(_))));
    }

    #[tokio::test]
    async fn test_unknown_tool_name_fails() {
        let mut agent = AgentForceAgent::new(AgentConfig::new("t"))
            .with_provider(EchoProvider::new("ok"))
            .with_tools(["fs_teleport"])
            .prompt("go");
        assert!(matches!(agent.run().await, Err(Error::Agent(ref m)) if m.contains("fs_teleport")));
    }

    #[tokio::test]
    async fn test_unconfigured_mcp_server_fails() {
        let mut agent = AgentForceAgent::new(AgentConfig::new("t"))
            .with_provider(EchoProvider::new("ok"))
            .with_mcp(["nowhere"])
            .prompt("go");
        assert!(matches!(agent.run().await, Err(Error::Mcp(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_provider_error() {
        let mut config = Config::default();
        config.providers.insert(
            "openrouter".to_string(),
            ProviderConfig {
                api_key_env: Some("AGENTFORCE_TEST_UNSET_KEY_7731".to_string()),
                ..ProviderConfig::openrouter()
            },
        );
        if std::env::var("OPENROUTER_API_KEY").is_ok() {
            return;
        }

        let mut agent = AgentForceAgent::new(AgentConfig::new("t"))
            .with_config(config)
            .use_llm(ProviderType::OpenRouter, "openai/gpt-4o-mini")
            .prompt("go");
        assert!(matches!(agent.run().await, Err(Error::Provider(_))));
    }

    #[tokio::test]
    async fn test_output_json_and_save() {
        let reply = "Sure:\n```json\n{\"colors\": [\"red\", \"blue\"]}\n```";
        let mut agent = AgentForceAgent::new(AgentConfig::new("colors"))
            .with_provider(EchoProvider::new(reply))
            .prompt("colors?");

        let json = agent.output(OutputFormat::Json).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["colors"][1], "blue");

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("colors.json");
        let saved = agent.save(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), saved);
        assert!(saved.contains("\"colors\""));
    }
}
