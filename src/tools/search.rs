//! Search tools: posts, people and feeds

use super::args::{
    clamp_limit, deserialize_limit, int_or_string_schema, SearchArgs, DEFAULT_SEARCH_LIMIT,
};
use super::{success, ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::QueryParams;
use crate::error::{validate_query, AppError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct SearchPostsArgs {
    #[schemars(description = "Search query")]
    pub query: String,

    #[serde(default, deserialize_with = "deserialize_limit")]
    #[schemars(
        schema_with = "int_or_string_schema",
        description = "Maximum number of results to return (1-100, default 25)"
    )]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional pagination cursor")]
    pub cursor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Sort order, either \"top\" (default) or \"latest\"")]
    pub sort: Option<String>,
}

/// Sort orders accepted by app.bsky.feed.searchPosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    Top,
    Latest,
}

impl SearchSort {
    pub fn parse(sort: Option<&str>) -> Result<Self, AppError> {
        match sort.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("top") => Ok(SearchSort::Top),
            Some("latest") | Some("recent") => Ok(SearchSort::Latest),
            Some(other) => Err(AppError::InvalidInput(format!(
                "Invalid sort '{}': expected \"top\" or \"latest\"",
                other
            ))),
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            SearchSort::Top => "top",
            SearchSort::Latest => "latest",
        }
    }
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::authenticated("search_posts", "search", "Search for posts"),
        search_posts,
    );
    registry.register(
        ToolMeta::authenticated("search_people", "search", "Search for users"),
        search_people,
    );
    registry.register(
        ToolMeta::authenticated("search_feeds", "search", "Search for feed generators"),
        search_feeds,
    );
}

pub async fn search_posts(ctx: Arc<ToolContext>, args: SearchPostsArgs) -> Result<Value, AppError> {
    validate_query(&args.query)?;
    let sort = SearchSort::parse(args.sort.as_deref())?;

    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("q", args.query.trim())
        .with("limit", clamp_limit(args.limit, DEFAULT_SEARCH_LIMIT))
        .with_opt("cursor", args.cursor)
        .with("sort", sort.as_param());
    let results: Value = client.query("app.bsky.feed.searchPosts", &params).await?;
    Ok(success("search_results", results))
}

pub async fn search_people(ctx: Arc<ToolContext>, args: SearchArgs) -> Result<Value, AppError> {
    validate_query(&args.query)?;

    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("q", args.query.trim())
        .with("limit", clamp_limit(args.limit, DEFAULT_SEARCH_LIMIT))
        .with_opt("cursor", args.cursor);
    let results: Value = client.query("app.bsky.actor.searchActors", &params).await?;
    Ok(success("search_results", results))
}

pub async fn search_feeds(ctx: Arc<ToolContext>, args: SearchArgs) -> Result<Value, AppError> {
    validate_query(&args.query)?;

    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("query", args.query.trim())
        .with("limit", clamp_limit(args.limit, DEFAULT_SEARCH_LIMIT))
        .with_opt("cursor", args.cursor);
    let results: Value = client
        .query("app.bsky.unspecced.getPopularFeedGenerators", &params)
        .await?;
    Ok(success("search_results", results))
}
