//! CLI mode implementation
//!
//! The binary serves MCP over stdio by default; the other subcommands run a
//! single tool or inspect the configuration from a terminal.

use crate::auth::config::{APP_PASSWORD_VAR, IDENTIFIER_VAR, SERVICE_URL_VAR};
use crate::auth::Config;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use serde_json::Value;

/// Bluesky MCP server
#[derive(Parser, Debug)]
#[command(name = "bluesky-mcp")]
#[command(about = "Model Context Protocol server for Bluesky", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Handle or DID to log in as
    #[arg(long, global = true, env = IDENTIFIER_VAR, hide_env_values = true)]
    pub identifier: Option<String>,

    /// App password for the account
    #[arg(long, global = true, env = APP_PASSWORD_VAR, hide_env_values = true)]
    pub app_password: Option<String>,

    /// PDS URL (defaults to https://bsky.social)
    #[arg(long, global = true, env = SERVICE_URL_VAR)]
    pub service_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output (no short flag to avoid conflicts)
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Serve MCP over stdin/stdout (the default)
    Serve,
    /// List the available tools
    Tools {
        /// Print the full tools/list JSON including input schemas
        #[arg(long)]
        json: bool,
    },
    /// Show configuration and authentication status
    Status {
        /// Log in before reporting
        #[arg(long)]
        connect: bool,
    },
    /// Run a single tool and print its JSON result
    Call {
        /// Tool name, e.g. get_profile
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

impl Cli {
    /// Account configuration from flags, which clap backs with the environment
    pub fn config(&self) -> Config {
        Config::from_lookup(|var| match var {
            IDENTIFIER_VAR => self.identifier.clone(),
            APP_PASSWORD_VAR => self.app_password.clone(),
            SERVICE_URL_VAR => self.service_url.clone(),
            _ => None,
        })
    }

    /// Default log filter when RUST_LOG is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

/// Parse the `--args` JSON for `call`
pub fn parse_tool_args(raw: &str) -> Result<Value, AppError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::InvalidInput(format!("--args is not valid JSON: {}", e)))?;
    match value {
        Value::Object(_) | Value::Null => Ok(value),
        _ => Err(AppError::InvalidInput(
            "--args must be a JSON object".to_string(),
        )),
    }
}
