mod logging;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use magpie_config::Config;
use magpie_server::AppState;
use magpie_tools::{DatabricksToolbox, ToolCall, catalog_for};
use magpie_types::AgentKind;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "magpie", about = "magpie: Databricks tools for LLM agents")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the tool server.
    Serve {
        /// Override the listening port (default: 8000).
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listening address (default: 0.0.0.0).
        #[arg(long)]
        host: Option<String>,
    },
    /// Call one tool and print its result.
    Call {
        /// Tool name, e.g. `list_clusters`.
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, value_name = "JSON")]
        params: Option<String>,
    },
    /// List the available tools.
    Tools {
        /// Only the tools exposed to this agent.
        #[arg(long)]
        agent: Option<String>,
    },
    /// Show the model each agent resolves to.
    Models,
    /// Validate the configuration and acquire a token.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(path, port, host).await,
        Commands::Call { tool, params } => cmd_call(path, &tool, params.as_deref()).await,
        Commands::Tools { agent } => cmd_tools(agent.as_deref()),
        Commands::Models => cmd_models(path),
        Commands::Check => cmd_check(path).await,
    }
}

fn load(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("config error")
}

async fn cmd_serve(path: Option<&Path>, port: Option<u16>, host: Option<String>) -> Result<()> {
    let mut config = load(path)?;
    let _guard = logging::init(&config.log);

    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(h) = host {
        config.server.host = h;
    }
    for warning in config.models.validate() {
        tracing::warn!("{warning}");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let toolbox = DatabricksToolbox::from_config(&config)?;
    let state = AppState::new(config, toolbox);
    let app = magpie_server::make_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "magpie tool server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn cmd_call(path: Option<&Path>, tool: &str, params: Option<&str>) -> Result<()> {
    let config = load(path)?;
    let _guard = logging::init(&config.log);

    let params = match params {
        Some(raw) => serde_json::from_str(raw).context("--params must be valid JSON")?,
        None => serde_json::Value::Null,
    };
    let call = ToolCall::parse(tool, params)?;
    let toolbox = DatabricksToolbox::from_config(&config)?;
    let result = toolbox.invoke(call).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_tools(agent: Option<&str>) -> Result<()> {
    let tools = match agent {
        Some(name) => catalog_for(name.parse::<AgentKind>()?),
        None => ToolCall::catalog().iter().collect(),
    };
    for spec in tools {
        if spec.required.is_empty() {
            println!("{:<22} {}", spec.name, spec.description);
        } else {
            println!(
                "{:<22} {} (requires: {})",
                spec.name,
                spec.description,
                spec.required.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_models(path: Option<&Path>) -> Result<()> {
    let config = Config::merge_with(path, |key| std::env::var(key).ok()).context("config error")?;
    let models = &config.models;
    println!("strategy: {:?}", models.strategy);
    for &agent in AgentKind::all() {
        let params = models.params_for(&models.resolve(agent));
        println!(
            "{agent}: {} (timeout {}s, max_tokens {}, temperature {})",
            params.model, params.timeout_secs, params.max_tokens, params.temperature
        );
    }
    for warning in models.validate() {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

async fn cmd_check(path: Option<&Path>) -> Result<()> {
    let config = load(path)?;
    let _guard = logging::init(&config.log);

    let auth = magpie_auth::token_provider(&config.databricks)?;
    auth.get_token().await.context("token acquisition failed")?;
    println!("configuration ok, token acquired for {}", config.databricks.workspace_url);
    match &config.databricks.warehouse_id {
        Some(id) => println!("default warehouse: {id}"),
        None => println!("no default warehouse; execute_sql needs warehouse_id"),
    }
    Ok(())
}
