//! Utility tools and helpers shared by the post tools

use super::args::HandleArgs;
use super::{ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::records::POST;
use crate::bluesky::uri::{make_at_uri, AtUri, BskyUrl};
use crate::bluesky::BskyClient;
use crate::error::{validate_actor, AppError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct ConvertUrlArgs {
    #[schemars(
        description = "bsky.app URL, e.g. https://bsky.app/profile/alice.bsky.social/post/3kabc"
    )]
    pub url: String,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::public(
            "resolve_handle",
            "utilities",
            "Resolve a handle to a DID; works without authentication",
        ),
        resolve_handle,
    );
    registry.register(
        ToolMeta::public(
            "convert_url_to_uri",
            "utilities",
            "Convert a bsky.app post or profile URL to an AT URI or DID",
        ),
        convert_url_to_uri,
    );
}

/// A post given either as an AT URI or as a bsky.app web URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostTarget {
    At(AtUri),
    Web { actor: String, rkey: String },
}

impl PostTarget {
    /// Check the shape of a post reference without touching the network
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let input = input.trim();
        if input.starts_with("at://") {
            return AtUri::parse(input).map(PostTarget::At);
        }
        match BskyUrl::parse(input) {
            Some(BskyUrl::Post { actor, rkey }) => Ok(PostTarget::Web { actor, rkey }),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid post URI/URL format: {}. Expected at:// URI or https://bsky.app/profile/{{handle}}/post/{{rkey}} URL",
                input
            ))),
        }
    }

    /// Canonical at:// URI, resolving a handle to its DID when needed
    pub async fn resolve(self, client: &BskyClient) -> Result<String, AppError> {
        match self {
            PostTarget::At(uri) if uri.is_did() => Ok(uri.to_string()),
            PostTarget::At(uri) => {
                let did = client.resolve_handle(&uri.authority).await?;
                Ok(make_at_uri(&did, &uri.collection, &uri.rkey))
            }
            PostTarget::Web { actor, rkey } => {
                let did = client.resolve_handle(&actor).await?;
                Ok(make_at_uri(&did, POST, &rkey))
            }
        }
    }
}

pub async fn resolve_handle(ctx: Arc<ToolContext>, args: HandleArgs) -> Result<Value, AppError> {
    validate_actor(args.handle.trim())?;

    let client = ctx.optional_client().await;
    let did = client.resolve_handle(&args.handle).await?;
    Ok(json!({
        "status": "success",
        "handle": args.handle,
        "did": did,
    }))
}

/// Map a bsky.app URL to its canonical identifier
///
/// Post URLs become `at://{did}/app.bsky.feed.post/{rkey}`, profile URLs
/// become the bare DID.
pub async fn convert_url_to_uri(ctx: Arc<ToolContext>, args: ConvertUrlArgs) -> Result<Value, AppError> {
    let parsed = BskyUrl::parse(&args.url)
        .ok_or_else(|| AppError::InvalidInput("Unsupported URL format".to_string()))?;
    validate_actor(parsed.actor())?;

    let client = ctx.optional_client().await;
    let did = client.resolve_handle(parsed.actor()).await?;
    let uri = match parsed {
        BskyUrl::Post { rkey, .. } => make_at_uri(&did, POST, &rkey),
        BskyUrl::Profile { .. } => did,
    };

    Ok(json!({"status": "success", "uri": uri}))
}
