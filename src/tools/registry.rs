//! Tool registry: name to descriptor lookup and typed dispatch

use super::ToolContext;
use crate::error::AppError;
use futures::future::{self, BoxFuture, FutureExt};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Upper bound on a single tool call, including authentication
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(120);

type Handler =
    Arc<dyn Fn(Arc<ToolContext>, Value) -> BoxFuture<'static, Result<Value, AppError>> + Send + Sync>;

/// Static description of a tool
#[derive(Debug, Clone, Copy)]
pub struct ToolMeta {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub requires_auth: bool,
}

impl ToolMeta {
    /// A tool that needs a logged-in session
    pub const fn authenticated(
        name: &'static str,
        category: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            category,
            description,
            requires_auth: true,
        }
    }

    /// A tool usable without credentials
    pub const fn public(
        name: &'static str,
        category: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            category,
            description,
            requires_auth: false,
        }
    }
}

/// A registered tool: metadata, input schema and type-erased handler
#[derive(Clone)]
pub struct ToolDescriptor {
    pub meta: ToolMeta,
    pub input_schema: Value,
    handler: Handler,
}

impl ToolDescriptor {
    /// Entry for the tools/list response
    pub fn to_listing(&self) -> Value {
        json!({
            "name": self.meta.name,
            "description": self.meta.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// Ordered set of tools, built once at start-up
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler taking typed arguments
    ///
    /// Arguments are deserialised before the handler runs, so a malformed call
    /// never reaches the network.
    pub fn register<A, F, Fut>(&mut self, meta: ToolMeta, handler: F)
    where
        A: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(Arc<ToolContext>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AppError>> + Send + 'static,
    {
        debug_assert!(self.get(meta.name).is_none(), "duplicate tool {}", meta.name);

        let input_schema = input_schema::<A>();
        let handler: Handler = Arc::new(move |ctx, args| match parse_args::<A>(args) {
            Ok(args) => handler(ctx, args).boxed(),
            Err(e) => future::ready(Err(e)).boxed(),
        });

        self.tools.push(ToolDescriptor {
            meta,
            input_schema,
            handler,
        });
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.meta.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// The `tools` array for tools/list
    pub fn list(&self) -> Value {
        Value::Array(self.tools.iter().map(ToolDescriptor::to_listing).collect())
    }

    /// Invoke a tool by name under the per-call timeout
    pub async fn call(
        &self,
        ctx: Arc<ToolContext>,
        name: &str,
        args: Value,
    ) -> Result<Value, AppError> {
        let tool = self
            .get(name)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown tool: {}", name)))?;

        debug!(tool = name, "calling tool");
        let result = match timeout(TOOL_TIMEOUT, (tool.handler)(ctx.clone(), args)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "Tool '{}' exceeded {} second timeout",
                name,
                TOOL_TIMEOUT.as_secs()
            ))),
        };

        if let Err(e) = &result {
            warn!(tool = name, code = e.error_code(), "tool failed: {}", e);
            // A rejected token should not be reused by the next call, even
            // from a tool that only borrowed the session
            if matches!(e, AppError::Authentication(_)) {
                ctx.auth.invalidate().await;
            }
        }

        result
    }
}

fn parse_args<A: DeserializeOwned>(args: Value) -> Result<A, AppError> {
    let args = match args {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| AppError::InvalidInput(format!("Invalid arguments: {}", e)))
}

fn input_schema<A: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(A);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("type").or_insert_with(|| json!("object"));
        obj.entry("properties").or_insert_with(|| json!({}));
    }
    value
}
