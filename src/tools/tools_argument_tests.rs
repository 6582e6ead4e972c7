//! Argument validation across every tool
//!
//! Each case must fail with InvalidInput before the tool authenticates or
//! issues any request, so the mock PDS expects zero calls.

use super::{build_registry, ToolContext, ToolRegistry};
use crate::auth::Config;
use crate::error::AppError;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn untouched_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    server
}

fn context(server: &MockServer) -> Arc<ToolContext> {
    let config = Config::new(
        Some("alice.test".into()),
        Some("app-pass".into()),
        Some(server.uri()),
    );
    Arc::new(ToolContext::new(config, reqwest::Client::new()))
}

async fn assert_rejected(registry: &ToolRegistry, ctx: &Arc<ToolContext>, tool: &str, args: Value) {
    let result = registry.call(ctx.clone(), tool, args.clone()).await;
    assert!(
        matches!(result, Err(AppError::InvalidInput(_))),
        "{} with {} should be rejected, got {:?}",
        tool,
        args,
        result
    );
}

#[tokio::test]
async fn missing_required_arguments_are_rejected() {
    let server = untouched_server().await;
    let ctx = context(&server);
    let registry = build_registry();

    let cases = [
        ("follow_user", json!({})),
        ("block_user", json!({})),
        ("unblock_user", json!({})),
        ("mute_user", json!({})),
        ("unmute_user", json!({})),
        ("get_feed_posts", json!({})),
        ("get_list_posts", json!({})),
        ("get_post_thread", json!({})),
        ("create_post", json!({})),
        ("send_image", json!({"text": "hi"})),
        ("send_images", json!({"text": "hi"})),
        ("send_video", json!({"text": "hi"})),
        ("delete_post", json!({})),
        ("like_post", json!({"uri": "at://did:plc:abc/app.bsky.feed.post/1"})),
        ("unlike_post", json!({})),
        ("repost_post", json!({})),
        ("unrepost_post", json!({})),
        ("get_likes", json!({})),
        ("get_reposted_by", json!({})),
        ("search_posts", json!({})),
        ("search_people", json!({})),
        ("search_feeds", json!({})),
        ("resolve_handle", json!({})),
        ("convert_url_to_uri", json!({})),
    ];

    for (tool, args) in cases {
        assert_rejected(&registry, &ctx, tool, args).await;
    }
    assert!(!ctx.auth.is_authenticated().await);
}

#[tokio::test]
async fn malformed_arguments_are_rejected() {
    let server = untouched_server().await;
    let ctx = context(&server);
    let registry = build_registry();
    let post = "at://did:plc:abc/app.bsky.feed.post/1";

    let five_images: Vec<Value> = (0..5)
        .map(|_| json!({"image_data": "aGVsbG8=", "alt": ""}))
        .collect();

    let cases = [
        ("follow_user", json!({"handle": ""})),
        ("block_user", json!({"handle": "nodomain"})),
        ("get_profile", json!({"handle": "bad..handle"})),
        ("get_followers", json!({"handle": "x", "limit": "lots"})),
        ("get_user_posts", json!({"limit": "abc"})),
        ("get_feed_posts", json!({"feed": "not-a-feed"})),
        ("get_list_posts", json!({"list_uri": "at://did:plc:abc"})),
        ("get_post_thread", json!({"uri": "https://example.com/post/1"})),
        ("create_post", json!({"text": "   "})),
        ("create_post", json!({"text": "hi", "reply_to": {"uri": post, "cid": " "}})),
        ("create_post", json!({"text": "hi", "links": [{"url": "ftp://example.com"}]})),
        ("create_post", json!({"text": "hi", "quote": {"uri": "nope", "cid": "c"}})),
        ("send_image", json!({"text": "hi", "image_data": "***", "alt_text": ""})),
        ("send_images", json!({"text": "hi", "images": []})),
        ("send_images", json!({"text": "hi", "images": five_images})),
        ("send_video", json!({"text": "hi", "video_data": "", "alt_text": ""})),
        ("delete_post", json!({"uri": "https://example.com/x"})),
        ("like_post", json!({"uri": "not-a-uri", "cid": "c"})),
        ("like_post", json!({"uri": post, "cid": "  "})),
        ("repost_post", json!({"uri": post, "cid": ""})),
        ("unrepost_post", json!({"uri": "bsky.app/whatever"})),
        ("get_likes", json!({"uri": "at://only-authority"})),
        ("search_posts", json!({"query": "   "})),
        ("search_posts", json!({"query": "rust", "sort": "oldest"})),
        ("search_people", json!({"query": ""})),
        ("resolve_handle", json!({"handle": "did:plc"})),
        ("convert_url_to_uri", json!({"url": "https://example.com/profile/alice"})),
    ];

    for (tool, args) in cases {
        assert_rejected(&registry, &ctx, tool, args).await;
    }
}

#[tokio::test]
async fn wrong_argument_types_are_rejected() {
    let server = untouched_server().await;
    let ctx = context(&server);
    let registry = build_registry();

    assert_rejected(&registry, &ctx, "follow_user", json!({"handle": 42})).await;
    assert_rejected(&registry, &ctx, "get_profile", json!("alice.bsky.social")).await;
    assert_rejected(&registry, &ctx, "send_images", json!({"text": "hi", "images": "aGVsbG8="})).await;
}
