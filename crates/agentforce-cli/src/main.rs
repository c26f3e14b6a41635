//! AgentForce CLI - run agents, extract structured output, serve agents
//!
//! Library code never configures logging; the subscriber is installed here
//! from `--verbose`, `RUST_LOG`, or the config's `general.log_level`.

use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use agentforce_core::agent::{AgentConfig, AgentForceAgent, OutputFormat};
use agentforce_core::config::{Config, ConfigManager, McpServerConfig};
use agentforce_core::formatting::{
    FormattedOutput, HtmlFilterConfig, ValidationResult, format_as_html, format_as_json, format_as_markdown,
    format_as_yaml, validate_and_format_html, validate_and_format_json, validate_and_format_yaml,
};
use agentforce_core::mcp_manager::McpServerManager;
use agentforce_core::provider::ProviderType;
use agentforce_core::server::{AgentServer, Method};
use agentforce_core::tools::{BUILTIN_TOOL_NAMES, builtin_tool};

#[derive(Parser)]
#[command(name = "agentforce")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build LLM agents that return structured output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace directory for filesystem tools
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent once and print its reply
    Run(RunArgs),

    /// Extract JSON, YAML, HTML or Markdown from a file or stdin
    Format(FormatArgs),

    /// Serve an agent at POST /agent
    Serve(ServeArgs),

    /// Show available built-in tools
    Tools,

    /// Show the resolved configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

/// Provider and agent options shared by `run` and `serve`
#[derive(Args, Clone)]
struct AgentArgs {
    /// LLM provider (ollama, openrouter, gemini); defaults to config
    #[arg(short, long)]
    provider: Option<ProviderType>,

    /// Model to use (defaults to the provider's model)
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    system: Option<String>,

    /// Template file appended to the system prompt
    #[arg(long = "template")]
    templates: Vec<PathBuf>,

    /// Built-in tool to enable (repeatable)
    #[arg(long = "tool")]
    tools: Vec<String>,

    /// Configured MCP server to enable (repeatable)
    #[arg(long = "mcp")]
    mcps: Vec<String>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Log prompts and replies
    #[arg(long)]
    debug: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Prompt to send
    #[arg(long)]
    prompt: String,

    /// Output format: text, json, yaml, md, html
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    /// Write the output to a file; the extension picks the format
    #[arg(long)]
    save: Option<PathBuf>,

    #[command(flatten)]
    agent: AgentArgs,
}

#[derive(Args)]
struct FormatArgs {
    /// Target format: json, yaml, html, md
    #[arg(short, long)]
    format: OutputFormat,

    /// Input file (reads stdin when omitted)
    #[arg(long)]
    file: Option<PathBuf>,

    /// CSS-style selector for HTML filtering
    #[arg(long)]
    selector: Option<String>,

    /// Comma-separated element names to keep (HTML)
    #[arg(long, value_delimiter = ',')]
    elements: Vec<String>,

    /// Emit element text instead of markup (HTML)
    #[arg(long)]
    text_only: bool,

    /// Keep attributes on emitted elements (HTML)
    #[arg(long)]
    attributes: bool,

    /// Treat the whole input as the document, ignoring fenced blocks
    #[arg(long)]
    no_blocks: bool,

    /// Print the full validation result as JSON
    #[arg(long)]
    report: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// Agent name reported in responses
    #[arg(long, default_value = "agentforce")]
    name: String,

    #[command(flatten)]
    agent: AgentArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    init_logging(cli.verbose, &config_manager.config().general.log_level);

    let workspace = resolve_workspace(cli.workspace.as_deref(), config_manager.config())?;

    match cli.command {
        Commands::Run(args) => run_agent(args, config_manager.config().clone(), workspace).await,
        Commands::Format(args) => run_format(args),
        Commands::Serve(args) => run_serve(args, config_manager.config().clone(), workspace).await,
        Commands::Tools => {
            show_tools(&workspace);
            Ok(())
        }
        Commands::Config { init } => show_config(&config_manager, init),
    }
}

fn init_logging(verbose: bool, log_level: &str) {
    let filter = if verbose {
        EnvFilter::new("info,agentforce_core=debug,agentforce_mcp=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };
    // stdout carries agent output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI flag, then config, then the current directory
fn resolve_workspace(flag: Option<&Path>, config: &Config) -> anyhow::Result<PathBuf> {
    let path = match flag.or(config.general.workspace.as_deref()) {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    // dunce avoids the \\?\ prefix on Windows
    Ok(dunce::canonicalize(&path).unwrap_or(path))
}

fn build_agent(name: &str, args: &AgentArgs, config: &Config, workspace: &Path) -> anyhow::Result<AgentForceAgent> {
    let provider = match args.provider {
        Some(provider) => provider,
        None => config
            .default_provider
            .parse::<ProviderType>()
            .map_err(anyhow::Error::msg)?,
    };

    let mut settings = config
        .provider_for(provider)
        .map(|p| p.model_settings())
        .unwrap_or_default();
    if args.temperature.is_some() {
        settings.temperature = args.temperature;
    }
    if args.max_tokens.is_some() {
        settings.max_tokens = args.max_tokens;
    }

    let agent_config = AgentConfig {
        name: name.to_string(),
        tools: args.tools.clone(),
        mcps: args.mcps.clone(),
        workspace: Some(workspace.to_path_buf()),
        max_tool_rounds: None,
    };

    let mut agent = AgentForceAgent::new(agent_config)
        .with_config(config.clone())
        .use_llm(provider, args.model.clone().unwrap_or_default())
        .with_model_config(settings);
    if let Some(system) = &args.system {
        agent = agent.system_prompt(system.clone());
    }
    for template in &args.templates {
        agent = agent.with_template(template.clone());
    }
    if args.debug {
        agent = agent.debug();
    }
    Ok(agent)
}

async fn run_agent(args: RunArgs, config: Config, workspace: PathBuf) -> anyhow::Result<()> {
    let mut agent = build_agent("cli", &args.agent, &config, &workspace)?.prompt(args.prompt);

    match &args.save {
        Some(path) => {
            agent.save(path).await?;
            eprintln!(
                "{} {} ({})",
                style("Saved").green(),
                path.display(),
                OutputFormat::from_path(path)
            );
        }
        None => {
            let output = agent.output(args.output).await?;
            println!("{}", output);
        }
    }
    Ok(())
}

fn run_format(args: FormatArgs) -> anyhow::Result<()> {
    let raw = match &args.file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    let result = extract(&args, &raw);
    if args.report {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_content(&result.content));
    }

    if let Some(error) = &result.error {
        eprintln!("{} {}", style("Invalid:").red(), error);
        std::process::exit(1);
    }
    Ok(())
}

fn html_filter(args: &FormatArgs) -> HtmlFilterConfig {
    let mut filter = HtmlFilterConfig::new()
        .text_only(args.text_only)
        .include_attributes(args.attributes);
    if !args.elements.is_empty() {
        filter = filter.with_elements(args.elements.clone());
    }
    if let Some(selector) = &args.selector {
        filter = filter.with_selector(selector.clone());
    }
    filter
}

fn extract(args: &FormatArgs, raw: &str) -> ValidationResult {
    if !args.no_blocks {
        return match args.format {
            OutputFormat::Json => validate_and_format_json(raw),
            OutputFormat::Yaml => validate_and_format_yaml(raw),
            OutputFormat::Html => validate_and_format_html(raw, &html_filter(args)),
            OutputFormat::Markdown => valid(FormattedOutput::Text(format_as_markdown(raw))),
            OutputFormat::Text => valid(FormattedOutput::Text(raw.trim().to_string())),
        };
    }

    let result = match args.format {
        OutputFormat::Json => Ok(format_as_json(raw, false)),
        OutputFormat::Yaml => format_as_yaml(raw, false).map(FormattedOutput::Text),
        OutputFormat::Html => format_as_html(raw, &html_filter(args), false).map(FormattedOutput::Text),
        OutputFormat::Markdown | OutputFormat::Text => Ok(FormattedOutput::Text(raw.trim().to_string())),
    };
    match result {
        Ok(content) => valid(content),
        Err(e) => ValidationResult {
            is_valid: false,
            content: FormattedOutput::Text(raw.trim().to_string()),
            error: Some(e.to_string()),
        },
    }
}

fn valid(content: FormattedOutput) -> ValidationResult {
    ValidationResult {
        is_valid: true,
        content,
        error: None,
    }
}

fn render_content(content: &FormattedOutput) -> String {
    match content {
        FormattedOutput::Json(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        FormattedOutput::Text(text) => text.clone(),
    }
}

async fn run_serve(args: ServeArgs, config: Config, workspace: PathBuf) -> anyhow::Result<()> {
    // One manager for all requests so MCP servers start once
    let mcp_configs: HashMap<String, McpServerConfig> = args
        .agent
        .mcps
        .iter()
        .map(|name| {
            config
                .get_mcp_server(name)
                .cloned()
                .map(|server| (name.clone(), server))
                .with_context(|| format!("MCP server '{}' is not configured", name))
        })
        .collect::<anyhow::Result<_>>()?;
    let manager = Arc::new(McpServerManager::with_configs(mcp_configs));
    manager.start_named(&args.agent.mcps).await?;

    // Fail on bad flags before binding
    build_agent(&args.name, &args.agent, &config, &workspace)?;

    let name = args.name.clone();
    let agent_args = args.agent.clone();
    let factory_manager = manager.clone();
    let factory = move || {
        build_agent(&name, &agent_args, &config, &workspace)
            .map(|agent| agent.with_mcp_manager(factory_manager.clone()))
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to build agent, using bare defaults");
                AgentForceAgent::new(AgentConfig::new(name.clone()))
            })
    };

    println!(
        "{} {} at http://{}/agent",
        style("Serving").green().bold(),
        style(&args.name).cyan(),
        args.addr
    );

    AgentServer::new(args.name.clone())
        .add_route_agent(Method::POST, "/agent", factory)
        .serve(args.addr)
        .await?;

    for (server, result) in manager.stop_all().await {
        if let Err(e) = result {
            tracing::warn!(server = %server, error = %e, "Failed to stop MCP server");
        }
    }
    Ok(())
}

fn show_tools(workspace: &Path) {
    println!("{}", style("Available Tools:").bold());
    println!();

    for name in BUILTIN_TOOL_NAMES {
        if let Some(tool) = builtin_tool(name, workspace) {
            println!("  {:<16} {}", style(name).cyan(), tool.description());
        }
    }
    println!();
    println!(
        "  {}",
        style("MCP tools appear as mcp__<server>__<tool> when --mcp is given").dim()
    );
}

fn show_config(manager: &ConfigManager, init: bool) -> anyhow::Result<()> {
    if init {
        if manager.path().exists() {
            println!("{} {}", style("Config exists:").yellow(), manager.path().display());
        } else {
            manager.save()?;
            println!("{} {}", style("Wrote").green(), manager.path().display());
        }
    }

    println!("{}", style("Configuration:").bold());
    println!("  File: {}", style(manager.path().display()).green());
    println!();

    let mut config = manager.config().clone();
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("********".to_string());
        }
    }
    println!("{}", toml::to_string_pretty(&config)?);

    for name in config.list_providers() {
        if let Some(provider) = config.get_provider(name) {
            let key = if provider.get_api_key().is_some() {
                style("key set").green()
            } else if provider.provider_type.requires_api_key() {
                style("no key").red()
            } else {
                style("no key needed").dim()
            };
            println!("  {:<12} {:<28} [{}]", style(name).cyan(), provider.model, key);
        }
    }
    Ok(())
}
