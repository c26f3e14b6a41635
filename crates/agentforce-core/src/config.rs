//! Configuration management for AgentForce
//!
//! Handles loading, saving, and managing configuration, including provider
//! credentials and MCP server definitions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::{ModelSettings, ProviderType};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default provider to use
    #[serde(default = "default_provider_name")]
    pub default_provider: String,
    /// Provider configurations keyed by name
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
    /// MCP servers keyed by name
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

fn default_provider_name() -> String {
    "ollama".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert("ollama".to_string(), ProviderConfig::ollama());
    providers.insert("openrouter".to_string(), ProviderConfig::openrouter());
    providers.insert("gemini".to_string(), ProviderConfig::gemini());
    providers
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: default_provider_name(),
            providers: default_providers(),
            mcp_servers: HashMap::new(),
            general: GeneralConfig::default(),
        }
    }
}

impl Config {
    /// Get the provider config for the default provider
    pub fn get_default_provider(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.default_provider)
    }

    /// Get a specific provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Provider config for a type: the entry with that name, else the first
    /// entry of that type
    pub fn provider_for(&self, provider_type: ProviderType) -> Option<&ProviderConfig> {
        self.providers.get(provider_type.as_str()).or_else(|| {
            self.providers
                .values()
                .find(|p| p.provider_type == provider_type)
        })
    }

    /// Get an MCP server definition by name
    pub fn get_mcp_server(&self, name: &str) -> Option<&McpServerConfig> {
        self.mcp_servers.get(name)
    }

    /// List all configured provider names
    pub fn list_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// LLM Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    /// API key (can be loaded from env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub model: String,
    /// Base URL override (self-hosted Ollama, proxies)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_temperature: Option<f64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::ollama()
    }
}

impl ProviderConfig {
    /// Catalog defaults for a provider type
    pub fn for_type(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            api_key: None,
            api_key_env: provider_type.api_key_env().map(String::from),
            model: provider_type.default_model().to_string(),
            base_url: None,
            default_max_tokens: None,
            default_temperature: None,
        }
    }

    pub fn ollama() -> Self {
        Self::for_type(ProviderType::Ollama)
    }

    pub fn openrouter() -> Self {
        Self::for_type(ProviderType::OpenRouter)
    }

    pub fn gemini() -> Self {
        Self::for_type(ProviderType::Gemini)
    }

    /// Get the API key, checking environment variables if not set directly
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key
            && !key.is_empty()
        {
            return Some(key.clone());
        }

        let env_names = self
            .api_key_env
            .as_deref()
            .into_iter()
            .chain(self.provider_type.api_key_env());
        for env_name in env_names {
            if let Ok(key) = std::env::var(env_name)
                && !key.is_empty()
            {
                return Some(key);
            }
        }

        if self.provider_type == ProviderType::Gemini {
            return std::env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty());
        }

        None
    }

    /// Sampling defaults for agents using this provider
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            temperature: self.default_temperature,
            max_tokens: self.default_max_tokens,
        }
    }
}

/// MCP server definition
///
/// Either a local command spoken to over stdio, or a remote `url` spoken to
/// over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl McpServerConfig {
    /// A server launched as a child process
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            enabled: true,
        }
    }

    /// A server reached over HTTP
    pub fn new_http(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new("")
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_http(&self) -> bool {
        self.url.is_some()
    }
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// JSON-lines file receiving every LLM exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_log: Option<PathBuf>,
    /// Root directory for the filesystem tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    /// Upper bound on model/tool round trips per run
    pub max_tool_rounds: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            interaction_log: None,
            workspace: None,
            max_tool_rounds: 10,
        }
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("agentforce").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Update provider settings for a specific provider
    pub fn set_provider(&mut self, name: &str, provider: ProviderConfig) {
        self.config.providers.insert(name.to_string(), provider);
    }

    /// Add or replace an MCP server definition
    pub fn set_mcp_server(&mut self, name: &str, server: McpServerConfig) {
        self.config.mcp_servers.insert(name.to_string(), server);
    }

    /// Get API key for default provider
    pub fn get_api_key(&self) -> Option<String> {
        self.config
            .get_default_provider()
            .and_then(|p| p.get_api_key())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            config_path: PathBuf::from("config.toml"),
            config: Config::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_provider, "ollama");
        assert_eq!(config.list_providers(), vec!["gemini", "ollama", "openrouter"]);
        assert!(config.mcp_servers.is_empty());
        assert_eq!(config.general.max_tool_rounds, 10);

        let ollama = config.get_default_provider().unwrap();
        assert_eq!(ollama.provider_type, ProviderType::Ollama);
        assert!(ollama.api_key_env.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.mcp_servers.insert(
            "files".to_string(),
            McpServerConfig::new("npx").with_args(vec!["-y".into(), "server-filesystem".into()]),
        );
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("default_provider"));
        assert!(toml_str.contains("[providers.openrouter]"));
        assert!(toml_str.contains("[mcp_servers.files]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.providers.len(), 3);
        assert_eq!(parsed.mcp_servers["files"].args.len(), 2);
    }

    #[test]
    fn test_partial_toml() {
        let parsed: Config = toml::from_str(
            r#"
default_provider = "gemini"

[providers.gemini]
provider_type = "gemini"
model = "gemini-1.5-pro"
default_temperature = 0.2

[mcp_servers.remote]
url = "http://localhost:8080/mcp"
enabled = false

[general]
max_tool_rounds = 3
"#,
        )
        .unwrap();

        let gemini = parsed.get_default_provider().unwrap();
        assert_eq!(gemini.model, "gemini-1.5-pro");
        assert_eq!(gemini.model_settings().temperature, Some(0.2));
        assert_eq!(gemini.model_settings().max_tokens, None);
        let remote = parsed.get_mcp_server("remote").unwrap();
        assert!(remote.is_http());
        assert!(!remote.enabled);
        assert_eq!(parsed.general.max_tool_rounds, 3);
        assert_eq!(parsed.general.log_level, "info");
    }

    #[test]
    fn test_direct_api_key_wins() {
        let mut config = ProviderConfig::openrouter();
        config.api_key = Some("sk-direct".to_string());
        assert_eq!(config.get_api_key(), Some("sk-direct".to_string()));
    }

    #[test]
    fn test_api_key_from_env() {
        let mut config = ProviderConfig::ollama();
        config.api_key_env = Some("AGENTFORCE_TEST_API_KEY_12345".to_string());

        // SAFETY: the variable name is unique to this test
        unsafe { std::env::set_var("AGENTFORCE_TEST_API_KEY_12345", "test-key") };
        assert_eq!(config.get_api_key(), Some("test-key".to_string()));
        unsafe { std::env::remove_var("AGENTFORCE_TEST_API_KEY_12345") };
    }

    #[test]
    fn test_provider_for_type() {
        let mut config = Config::default();
        config.providers.remove("gemini");
        config.providers.insert("work".to_string(), ProviderConfig::gemini());
        assert_eq!(
            config.provider_for(ProviderType::Gemini).map(|p| p.provider_type),
            Some(ProviderType::Gemini)
        );
    }

    #[test]
    fn test_mcp_server_builders() {
        let stdio = McpServerConfig::new("echo")
            .with_args(vec!["hello".into()])
            .with_env("TOKEN", "abc")
            .with_enabled(false);
        assert_eq!(stdio.command, "echo");
        assert_eq!(stdio.env.get("TOKEN").map(String::as_str), Some("abc"));
        assert!(!stdio.enabled);
        assert!(!stdio.is_http());

        let http = McpServerConfig::new_http("http://localhost:9000/mcp");
        assert!(http.is_http());
        assert!(http.enabled);
    }

    #[test]
    fn test_manager_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut manager = ConfigManager::with_path(path.clone()).unwrap();
        assert_eq!(manager.config().default_provider, "ollama");
        manager.config_mut().default_provider = "openrouter".to_string();
        manager.set_mcp_server("echo", McpServerConfig::new("echo"));
        manager.save().unwrap();

        let reloaded = ConfigManager::with_path(path).unwrap();
        assert_eq!(reloaded.config().default_provider, "openrouter");
        assert!(reloaded.config().get_mcp_server("echo").is_some());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_provider = [").unwrap();
        assert!(matches!(ConfigManager::with_path(path), Err(Error::Config(_))));
    }
}
