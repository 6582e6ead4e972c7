//! Feed tools: timeline, custom feeds, lists, author feeds, threads and trends

use super::args::{
    clamp_depth, clamp_limit, deserialize_limit, int_or_string_schema, ActorPageArgs, NoArgs,
    DEFAULT_LIMIT,
};
use super::util::PostTarget;
use super::{success, ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::uri::AtUri;
use crate::bluesky::QueryParams;
use crate::error::{validate_actor, AppError};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Bluesky's "What's Hot" generator, the sample used for trending hashtags
pub const WHATS_HOT_FEED: &str =
    "at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.generator/whats-hot";

const TRENDS_SAMPLE_SIZE: u32 = 100;
const TRENDS_TOP_N: usize = 20;

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct TimelineArgs {
    #[serde(default, deserialize_with = "deserialize_limit")]
    #[schemars(
        schema_with = "int_or_string_schema",
        description = "Maximum number of results to return (1-100, default 50)"
    )]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional pagination cursor")]
    pub cursor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional algorithm, e.g. \"reverse-chronological\"")]
    pub algorithm: Option<String>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct FeedArgs {
    #[schemars(description = "AT URI of the feed generator")]
    pub feed: String,

    #[serde(default, deserialize_with = "deserialize_limit")]
    #[schemars(
        schema_with = "int_or_string_schema",
        description = "Maximum number of results to return (1-100, default 50)"
    )]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional pagination cursor")]
    pub cursor: Option<String>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct ListFeedArgs {
    #[schemars(description = "AT URI of the list")]
    pub list_uri: String,

    #[serde(default, deserialize_with = "deserialize_limit")]
    #[schemars(
        schema_with = "int_or_string_schema",
        description = "Maximum number of results to return (1-100, default 50)"
    )]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional pagination cursor")]
    pub cursor: Option<String>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct UserPostsArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional handle or DID; defaults to the authenticated user")]
    pub handle: Option<String>,

    #[serde(default, deserialize_with = "deserialize_limit")]
    #[schemars(
        schema_with = "int_or_string_schema",
        description = "Maximum number of results to return (1-100, default 50)"
    )]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional pagination cursor")]
    pub cursor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional filter, e.g. \"posts_with_media\", \"posts_no_replies\"")]
    pub filter: Option<String>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct ThreadArgs {
    #[schemars(description = "AT URI or bsky.app URL of the post")]
    pub uri: String,

    #[serde(default, deserialize_with = "deserialize_limit")]
    #[schemars(
        schema_with = "int_or_string_schema",
        description = "Maximum reply depth to retrieve (0-1000, default 6)"
    )]
    pub depth: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_limit")]
    #[schemars(
        schema_with = "int_or_string_schema",
        description = "Maximum number of parent posts to retrieve (0-1000, default 80)"
    )]
    pub parent_height: Option<i64>,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::authenticated(
            "get_timeline_posts",
            "posts",
            "Get posts from the authenticated user's home timeline",
        ),
        get_timeline_posts,
    );
    registry.register(
        ToolMeta::authenticated("get_feed_posts", "posts", "Get posts from a custom feed"),
        get_feed_posts,
    );
    registry.register(
        ToolMeta::authenticated("get_list_posts", "posts", "Get posts from a list feed"),
        get_list_posts,
    );
    registry.register(
        ToolMeta::authenticated("get_user_posts", "posts", "Get posts authored by a user"),
        get_user_posts,
    );
    registry.register(
        ToolMeta::authenticated("get_liked_posts", "posts", "Get posts liked by a user"),
        get_liked_posts,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_post_thread",
            "posts",
            "Get a post thread with its parents and replies",
        ),
        get_post_thread,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_pinned_feeds",
            "utilities",
            "Get the feeds saved in the authenticated user's preferences",
        ),
        get_pinned_feeds,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_trends",
            "utilities",
            "Get trending hashtags from currently popular posts",
        ),
        get_trends,
    );
}

pub async fn get_timeline_posts(ctx: Arc<ToolContext>, args: TimelineArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor)
        .with_opt("algorithm", args.algorithm.filter(|a| !a.is_empty()));
    let timeline: Value = client.query("app.bsky.feed.getTimeline", &params).await?;
    Ok(success("timeline", timeline))
}

pub async fn get_feed_posts(ctx: Arc<ToolContext>, args: FeedArgs) -> Result<Value, AppError> {
    AtUri::parse(&args.feed)?;

    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("feed", args.feed.trim())
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor);
    let feed: Value = client.query("app.bsky.feed.getFeed", &params).await?;
    Ok(success("feed", feed))
}

pub async fn get_list_posts(ctx: Arc<ToolContext>, args: ListFeedArgs) -> Result<Value, AppError> {
    AtUri::parse(&args.list_uri)?;

    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("list", args.list_uri.trim())
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor);
    let list_feed: Value = client.query("app.bsky.feed.getListFeed", &params).await?;
    Ok(success("list_feed", list_feed))
}

pub async fn get_user_posts(ctx: Arc<ToolContext>, args: UserPostsArgs) -> Result<Value, AppError> {
    if let Some(handle) = args.handle.as_deref().filter(|h| !h.trim().is_empty()) {
        validate_actor(handle.trim())?;
    }

    let client = ctx.client().await?;
    let actor = client.actor_or_self(args.handle.as_deref())?;
    let params = QueryParams::new()
        .with("actor", actor)
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor)
        .with_opt("filter", args.filter.filter(|f| !f.is_empty()));
    let author_feed: Value = client.query("app.bsky.feed.getAuthorFeed", &params).await?;
    Ok(success("author_feed", author_feed))
}

pub async fn get_liked_posts(ctx: Arc<ToolContext>, args: ActorPageArgs) -> Result<Value, AppError> {
    let likes = super::profile::actor_page(&ctx, "app.bsky.feed.getActorLikes", args).await?;
    Ok(success("likes", likes))
}

pub async fn get_post_thread(ctx: Arc<ToolContext>, args: ThreadArgs) -> Result<Value, AppError> {
    let target = PostTarget::parse(&args.uri)?;

    let client = ctx.client().await?;
    let uri = target.resolve(&client).await?;
    let params = QueryParams::new()
        .with("uri", uri)
        .with("depth", clamp_depth(args.depth, 6))
        .with("parentHeight", clamp_depth(args.parent_height, 80));
    let response: Value = client.query("app.bsky.feed.getPostThread", &params).await?;
    let thread = response.get("thread").cloned().unwrap_or(response);
    Ok(success("thread", thread))
}

/// Feed generator URIs saved in a getPreferences response
///
/// Every saved feed counts, pinned or not. The v2 saved-feeds preference wins
/// over the legacy one when both exist.
pub fn saved_feed_uris(preferences: &[Value]) -> Vec<String> {
    let find = |ty: &str| {
        preferences
            .iter()
            .find(|p| p.get("$type").and_then(Value::as_str) == Some(ty))
    };

    if let Some(pref) = find("app.bsky.actor.defs#savedFeedsPrefV2") {
        return pref
            .get("items")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("feed"))
            .filter_map(|item| item.get("value").and_then(Value::as_str))
            .map(String::from)
            .collect();
    }

    if let Some(pref) = find("app.bsky.actor.defs#savedFeedsPref") {
        return pref
            .get("saved")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|uri| uri.contains("/app.bsky.feed.generator/"))
            .map(String::from)
            .collect();
    }

    Vec::new()
}

pub async fn get_pinned_feeds(ctx: Arc<ToolContext>, _args: NoArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let prefs: Value = client
        .query("app.bsky.actor.getPreferences", &QueryParams::new())
        .await?;
    let preferences = prefs
        .get("preferences")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut feeds = Vec::new();
    for uri in saved_feed_uris(&preferences) {
        match client
            .query::<Value>(
                "app.bsky.feed.getFeedGenerator",
                &QueryParams::new().with("feed", &uri),
            )
            .await
        {
            Ok(info) => feeds.push(json!({"uri": uri, "info": info})),
            Err(e) => warn!("Failed to get feed details for {}: {}", uri, e),
        }
    }

    Ok(success("pinned_feeds", Value::Array(feeds)))
}

fn hashtag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\w+)").expect("valid hashtag regex"))
}

/// Count hashtags case-insensitively across feed items, most frequent first
pub fn count_hashtags(feed: &[Value]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in feed {
        let Some(text) = item
            .pointer("/post/record/text")
            .and_then(Value::as_str)
        else {
            continue;
        };
        for caps in hashtag_regex().captures_iter(text) {
            *counts.entry(caps[1].to_lowercase()).or_default() += 1;
        }
    }

    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

pub async fn get_trends(ctx: Arc<ToolContext>, _args: NoArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("feed", WHATS_HOT_FEED)
        .with("limit", TRENDS_SAMPLE_SIZE);
    let popular: Value = client.query("app.bsky.feed.getFeed", &params).await?;
    let feed = popular
        .get("feed")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let trends: Vec<Value> = count_hashtags(feed)
        .into_iter()
        .take(TRENDS_TOP_N)
        .map(|(tag, count)| json!({"tag": tag, "count": count}))
        .collect();

    Ok(success("trends", Value::Array(trends)))
}
