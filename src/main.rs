//! bluesky-mcp server & CLI
//!
//! Dual-mode application:
//! - MCP Server Mode (default): Model Context Protocol server using stdio
//! - CLI Mode: run a single tool or inspect the account configuration
//!
//! Credentials come from BLUESKY_IDENTIFIER and BLUESKY_APP_PASSWORD; the
//! session is only established when a tool first needs it.

mod auth;
mod bluesky;
mod cli;
mod error;
mod http;
mod mcp;
mod tools;

#[cfg(test)]
mod tests_tool_flows;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use error::AppError;
use serde_json::{json, Value};
use std::sync::Arc;
use tools::{build_registry, ToolContext, ToolRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log to stderr to keep stdout clean for JSON-RPC
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = Arc::new(build_registry());
    let http = http::client_with_timeout(http::REQUEST_TIMEOUT)?;
    let context = Arc::new(ToolContext::new(cli.config(), http));

    match cli.command.clone().unwrap_or(Commands::Serve) {
        Commands::Serve => run_mcp_mode(registry, context).await,
        command => {
            let result = run_cli_command(command, &registry, context).await;
            match result {
                Ok(output) => {
                    println!("{}", output);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(e.exit_code());
                }
            }
        }
    }
}

/// Run in MCP server mode
async fn run_mcp_mode(registry: Arc<ToolRegistry>, context: Arc<ToolContext>) -> Result<()> {
    info!("Starting bluesky-mcp server");
    if !context.auth.config().has_credentials() {
        info!("No credentials configured; only public tools will work");
    }

    let server = mcp::ServerContext::new(registry, context);
    mcp::handle_stdio(server).await
}

async fn run_cli_command(
    command: Commands,
    registry: &ToolRegistry,
    context: Arc<ToolContext>,
) -> Result<String, AppError> {
    match command {
        Commands::Serve => Err(AppError::Internal("serve is not a one-shot command".to_string())),
        Commands::Tools { json } => {
            if json {
                return pretty(&json!({ "tools": registry.list() }));
            }
            Ok(tool_table(registry))
        }
        Commands::Status { connect } => {
            if connect {
                // Failure is reflected in the status below
                let _ = context.auth.ensure_authenticated().await;
            }
            let environment = registry
                .call(context.clone(), "check_environment_variables", Value::Null)
                .await?;
            let auth = registry
                .call(context, "check_auth_status", Value::Null)
                .await?;
            pretty(&json!({ "environment": environment, "auth": auth }))
        }
        Commands::Call { tool, args } => {
            let args = cli::parse_tool_args(&args)?;
            let output = registry.call(context, &tool, args).await?;
            pretty(&output)
        }
    }
}

/// One line per tool: name, category and whether it needs a session
fn tool_table(registry: &ToolRegistry) -> String {
    let width = registry.iter().map(|t| t.meta.name.len()).max().unwrap_or(0);
    registry
        .iter()
        .map(|tool| {
            format!(
                "{:width$}  {:13}  {}{}",
                tool.meta.name,
                tool.meta.category,
                tool.meta.description,
                if tool.meta.requires_auth { "" } else { " (public)" },
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn pretty(value: &Value) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(value)?)
}
