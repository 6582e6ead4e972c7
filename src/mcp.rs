//! MCP (Model Context Protocol) handling module
//!
//! This module implements the JSON-RPC 2.0 protocol for MCP communication.

use crate::error::AppError;
use crate::tools::{ToolContext, ToolRegistry};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};
use tracing::{debug, error, info};

/// Protocol revision assumed when the client does not announce one
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol revisions echoed back when a client requests them
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

pub const SERVER_NAME: &str = "bluesky-social";

/// URI of the resource describing the available tools
pub const TOOLS_RESOURCE_URI: &str = "info://bluesky-tools";

// JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Server context for tracking client information
#[derive(Clone)]
pub struct ServerContext {
    pub client_info: Option<ClientInfo>,
    registry: Arc<ToolRegistry>,
    tools: Arc<ToolContext>,
}

impl ServerContext {
    pub fn new(registry: Arc<ToolRegistry>, tools: Arc<ToolContext>) -> Self {
        Self {
            client_info: None,
            registry,
            tools,
        }
    }

    pub fn get_client_name(&self) -> String {
        self.client_info
            .as_ref()
            .and_then(|info| info.name.as_ref())
            .cloned()
            .unwrap_or_else(|| "Unknown Client".to_string())
    }
}

/// MCP JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
pub struct McpRequest {
    /// JSON-RPC version field, accepted but not checked
    #[allow(dead_code)]
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Initialize request parameters
#[derive(Debug, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo")]
    pub client_info: Option<ClientInfo>,
}

/// Client information
#[derive(Debug, Deserialize, Clone)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// MCP JSON-RPC 2.0 response structure
#[derive(Debug, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

/// MCP Error structure
#[derive(Debug, Serialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
}

/// MCP Tool call arguments
#[derive(Debug, Deserialize)]
pub struct ToolCallArgs {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
}

/// MCP Content item
#[derive(Debug, Serialize, Deserialize)]
pub struct ContentItem {
    pub r#type: String,
    pub text: String,
}

/// MCP Tool result
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl McpResponse {
    /// Create a successful response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i64, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message: message.to_string(),
            }),
        }
    }
}

impl ToolResult {
    /// Successful tool output as pretty-printed JSON text
    pub fn json(payload: &Value) -> Self {
        let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
        }
    }

    /// Failed tool call, reported in-band so the assistant can read the reason
    pub fn failure(err: &AppError) -> Self {
        let payload = error_payload(err);
        Self {
            is_error: true,
            ..Self::json(&payload)
        }
    }
}

impl ContentItem {
    /// Helper to create plain text content
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            r#type: "text".to_string(),
            text: content.into(),
        }
    }
}

/// `{"status": "error", "code", "category", "message"}` for a failed call
pub fn error_payload(err: &AppError) -> Value {
    json!({
        "status": "error",
        "code": err.error_code(),
        "category": err.category(),
        "message": err.message(),
    })
}

/// Parse MCP request from JSON string
pub fn parse_request(json: &str) -> Result<McpRequest> {
    let request: McpRequest = serde_json::from_str(json)?;
    Ok(request)
}

/// Serialize MCP response to JSON string
pub fn serialize_response(response: &McpResponse) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}

/// Handle stdio MCP communication
pub async fn handle_stdio(mut context: ServerContext) -> Result<()> {
    info!(
        "Starting Bluesky MCP server on stdio with {} tools",
        context.registry.len()
    );

    let stdin = tokio::io::stdin();
    let mut reader = AsyncBufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received request: {}", line);

        let response = match parse_request(&line) {
            Ok(request) => handle_request(request, &mut context).await,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                Some(McpResponse::error(
                    None,
                    PARSE_ERROR,
                    &format!("Invalid JSON: {}", e),
                ))
            }
        };

        let Some(response) = response else {
            continue;
        };

        let response_json = serialize_response(&response)?;
        debug!("Sending response: {}", response_json);

        stdout.write_all(response_json.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}

/// Handle a single MCP request; notifications get no response
pub async fn handle_request(request: McpRequest, context: &mut ServerContext) -> Option<McpResponse> {
    if request.id.is_none() {
        debug!("Notification: {}", request.method);
        return None;
    }

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(request, context),
        "ping" => McpResponse::success(request.id, json!({})),
        "tools/list" => handle_tools_list(request, context),
        "tools/call" => handle_tool_call(request, context).await,
        "resources/list" => handle_resources_list(request),
        "resources/read" => handle_resources_read(request, context),
        _ => McpResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            &format!("Method '{}' not found", request.method),
        ),
    };
    Some(response)
}

/// Handle tools/call method
async fn handle_tool_call(request: McpRequest, context: &ServerContext) -> McpResponse {
    let args: ToolCallArgs = match serde_json::from_value(request.params.unwrap_or_default()) {
        Ok(args) => args,
        Err(e) => {
            return McpResponse::error(
                request.id,
                INVALID_PARAMS,
                &format!("Invalid parameters: {}", e),
            )
        }
    };

    if !context.registry.contains(&args.name) {
        return McpResponse::error(
            request.id,
            INVALID_PARAMS,
            &format!("Unknown tool: {}", args.name),
        );
    }

    info!(tool = %args.name, client = %context.get_client_name(), "tools/call");
    let result = match context
        .registry
        .call(context.tools.clone(), &args.name, args.arguments)
        .await
    {
        Ok(payload) => ToolResult::json(&payload),
        Err(e) => ToolResult::failure(&e),
    };

    match serde_json::to_value(result) {
        Ok(value) => McpResponse::success(request.id, value),
        Err(e) => McpResponse::error(request.id, INVALID_REQUEST, &e.to_string()),
    }
}

/// Handle tools/list method
fn handle_tools_list(request: McpRequest, context: &ServerContext) -> McpResponse {
    McpResponse::success(
        request.id,
        json!({ "tools": context.registry.list() }),
    )
}

/// Handle initialize method
fn handle_initialize(request: McpRequest, context: &mut ServerContext) -> McpResponse {
    let mut protocol_version = DEFAULT_PROTOCOL_VERSION.to_string();

    if let Some(params) = request.params {
        if let Ok(init_params) = serde_json::from_value::<InitializeParams>(params) {
            match init_params.protocol_version {
                Some(version) if SUPPORTED_PROTOCOL_VERSIONS.contains(&version.as_str()) => {
                    protocol_version = version;
                }
                Some(version) => {
                    info!(
                        "Client requested unsupported protocol {}, offering {}",
                        version, DEFAULT_PROTOCOL_VERSION
                    );
                }
                None => {}
            }
            context.client_info = init_params.client_info;
            info!(
                "Client connected: {} {}",
                context.get_client_name(),
                context
                    .client_info
                    .as_ref()
                    .and_then(|c| c.version.as_deref())
                    .unwrap_or_default()
            );
        }
    }

    let result = json!({
        "protocolVersion": protocol_version,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": { "subscribe": false, "listChanged": false }
        },
    });
    McpResponse::success(request.id, result)
}

fn handle_resources_list(request: McpRequest) -> McpResponse {
    McpResponse::success(
        request.id,
        json!({
            "resources": [{
                "uri": TOOLS_RESOURCE_URI,
                "name": "bluesky-tools",
                "description": "Information about the available Bluesky tools",
                "mimeType": "application/json",
            }]
        }),
    )
}

fn handle_resources_read(request: McpRequest, context: &ServerContext) -> McpResponse {
    let params: ReadResourceParams = match serde_json::from_value(request.params.unwrap_or_default()) {
        Ok(params) => params,
        Err(e) => {
            return McpResponse::error(
                request.id,
                INVALID_PARAMS,
                &format!("Invalid parameters: {}", e),
            )
        }
    };

    if params.uri != TOOLS_RESOURCE_URI {
        return McpResponse::error(
            request.id,
            INVALID_PARAMS,
            &format!("Unknown resource: {}", params.uri),
        );
    }

    let info = tools_info(&context.registry);
    let text = serde_json::to_string_pretty(&info).unwrap_or_else(|_| info.to_string());
    McpResponse::success(
        request.id,
        json!({
            "contents": [{
                "uri": TOOLS_RESOURCE_URI,
                "mimeType": "application/json",
                "text": text,
            }]
        }),
    )
}

/// Tool categories and authentication requirements
pub fn tools_info(registry: &ToolRegistry) -> Value {
    let mut categories: Map<String, Value> = Map::new();
    let mut public = Vec::new();

    for tool in registry.iter() {
        let entry = categories
            .entry(tool.meta.category.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(names) = entry {
            names.push(json!(tool.meta.name));
        }
        if !tool.meta.requires_auth {
            public.push(tool.meta.name);
        }
    }

    json!({
        "description": "Bluesky API Tools",
        "version": env!("CARGO_PKG_VERSION"),
        "auth_requirements": "Most tools require authentication using BLUESKY_IDENTIFIER and BLUESKY_APP_PASSWORD environment variables",
        "public_tools": public,
        "categories": categories,
    })
}
