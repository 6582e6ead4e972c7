//! Tool implementations exposed over MCP and the CLI

pub mod args;
pub mod auth_status;
pub mod feed;
pub mod graph;
pub mod notifications;
pub mod post;
pub mod profile;
pub mod react;
pub mod registry;
pub mod search;
pub mod util;

#[cfg(test)]
mod tools_argument_tests;

pub use registry::{ToolMeta, ToolRegistry};

use crate::auth::{AuthManager, Config};
use crate::bluesky::BskyClient;
use crate::error::AppError;
use serde_json::{json, Value};

/// Shared state handed to every tool call
pub struct ToolContext {
    pub auth: AuthManager,
    http: reqwest::Client,
}

impl ToolContext {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        Self {
            auth: AuthManager::new(config, http.clone()),
            http,
        }
    }

    /// Authenticated client, logging in on first use
    pub async fn client(&self) -> Result<BskyClient, AppError> {
        let session = self.auth.ensure_authenticated().await?;
        Ok(BskyClient::with_session(self.http.clone(), session))
    }

    /// The session's client when logged in, otherwise an anonymous one
    pub async fn optional_client(&self) -> BskyClient {
        match self.auth.current_session().await {
            Some(session) => BskyClient::with_session(self.http.clone(), session),
            None => BskyClient::new(self.http.clone(), self.auth.config().service()),
        }
    }
}

/// Build the registry with every tool, in listing order
pub fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    auth_status::register(&mut registry);
    profile::register(&mut registry);
    graph::register(&mut registry);
    feed::register(&mut registry);
    post::register(&mut registry);
    react::register(&mut registry);
    search::register(&mut registry);
    notifications::register(&mut registry);
    util::register(&mut registry);
    registry
}

/// `{"status": "success", key: value}`
pub(crate) fn success(key: &str, value: Value) -> Value {
    let mut payload = json!({"status": "success"});
    payload[key] = value;
    payload
}
