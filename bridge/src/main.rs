use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use mcp_bridge::bridge::{Bridge, SessionContext, SessionTool};
use mcp_bridge::config::BridgeConfig;
use mcp_bridge::logging;
use mcp_bridge::mcp::{ContentItem, ToolOutcome};

#[derive(Parser)]
#[command(name = "mcp-bridge")]
#[command(about = "Run a browser-automation MCP server for one session and call its tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the nearest .mcp-bridge.toml)
    #[arg(long, env = "MCP_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Persistent browser profile directory
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Override the pinned server package version
    #[arg(long)]
    server_version: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tools the server exposes
    Tools {
        /// Also print each tool's input schema
        #[arg(long)]
        schemas: bool,
    },
    /// Call a tool directly
    Call {
        /// Tool name
        tool: String,
        /// Arguments as JSON
        #[arg(long, short)]
        args: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("mcp_bridge")?;

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let ctx = SessionContext::new(format!("cli-{}", std::process::id()));
    let bridge = Bridge::connect(&config, &ctx)
        .await
        .with_context(|| format!("Failed to start {}", config.server.display()))?;

    let result = match cli.command {
        Commands::Tools { schemas } => run_tools(&bridge, schemas),
        Commands::Call { tool, args } => run_call_tool(&bridge, &ctx, &tool, args).await,
    };

    bridge.cleanup().await;
    result
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load_from_path(path)?,
        None => BridgeConfig::load()?,
    };

    if cli.headless {
        config.server.headless = true;
    }
    if let Some(dir) = &cli.profile_dir {
        config.server.profile_dir = Some(dir.clone());
    }
    if let Some(version) = &cli.server_version {
        config.server.version = version.clone();
    }
    config.server.validate()?;

    Ok(config)
}

fn run_tools(bridge: &Bridge, schemas: bool) -> Result<()> {
    println!("Available tools ({}):\n", bridge.tools().len());

    for tool in bridge.tools() {
        if tool.description().is_empty() {
            println!("  {}", tool.name());
        } else {
            println!("  {} - {}", tool.name(), tool.description());
        }
        if schemas {
            let schema = serde_json::to_string_pretty(tool.parameters_schema())?;
            for line in schema.lines() {
                println!("      {}", line);
            }
        }
    }

    Ok(())
}

async fn run_call_tool(
    bridge: &Bridge,
    ctx: &SessionContext,
    tool_name: &str,
    args: Option<String>,
) -> Result<()> {
    let tool = bridge
        .tool(tool_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", tool_name))?;

    let arguments: Value = match args {
        Some(json) => serde_json::from_str(&json).context("--args must be valid JSON")?,
        None => Value::Null,
    };

    println!("Calling tool: {}", tool_name);
    if !arguments.is_null() {
        println!("Arguments: {}", serde_json::to_string_pretty(&arguments)?);
    }
    println!();

    let cancel = ctx.cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling tool call");
            cancel.cancel();
        }
    });

    let outcome = tool.execute(arguments).await;
    interrupt.abort();

    match &outcome {
        ToolOutcome::Success(output) => {
            println!("Result:");
            println!("{}", output.text);
            for item in &output.content {
                if let ContentItem::Image { mime_type, data } = item {
                    println!("[image {} ({} bytes base64)]", mime_type, data.len());
                }
            }
            Ok(())
        }
        ToolOutcome::Failure(_) | ToolOutcome::Cancelled => {
            anyhow::bail!("{}", outcome.message())
        }
    }
}
