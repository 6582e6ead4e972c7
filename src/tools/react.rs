//! Reaction tools: likes and reposts
//!
//! Undoing a reaction deletes the caller's own like or repost record. The
//! target may be given either as the reaction record's URI or as the URI of
//! the post that was liked or reposted.

use super::args::{clamp_limit, PostPageArgs, PostRefArgs, PostUriArgs, DEFAULT_LIMIT};
use super::util::PostTarget;
use super::{success, ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::records::{subject_record, StrongRef, LIKE, REPOST};
use crate::bluesky::uri::AtUri;
use crate::bluesky::{BskyClient, QueryParams};
use crate::error::AppError;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::authenticated("like_post", "posts", "Like a post"),
        like_post,
    );
    registry.register(
        ToolMeta::authenticated("unlike_post", "posts", "Remove a like from a post"),
        unlike_post,
    );
    registry.register(
        ToolMeta::authenticated("repost_post", "posts", "Repost a post"),
        repost_post,
    );
    registry.register(
        ToolMeta::authenticated("unrepost_post", "posts", "Remove a repost of a post"),
        unrepost_post,
    );
    registry.register(
        ToolMeta::authenticated("get_likes", "posts", "Get the accounts that liked a post"),
        get_likes,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_reposted_by",
            "posts",
            "Get the accounts that reposted a post",
        ),
        get_reposted_by,
    );
}

fn check_post_ref(args: &PostRefArgs) -> Result<PostTarget, AppError> {
    let target = PostTarget::parse(&args.uri)?;
    if args.cid.trim().is_empty() {
        return Err(AppError::InvalidInput("cid cannot be empty".to_string()));
    }
    Ok(target)
}

async fn react(client: &BskyClient, collection: &str, target: PostTarget, cid: &str) -> Result<StrongRef, AppError> {
    let uri = target.resolve(client).await?;
    let subject = StrongRef::new(uri, cid.trim());
    client
        .create_record(collection, subject_record(collection, &subject))
        .await
}

/// Delete our own reaction record of `collection` for the given target
async fn undo_reaction(
    client: &BskyClient,
    collection: &str,
    target: PostTarget,
) -> Result<String, AppError> {
    let uri = AtUri::parse(&target.resolve(client).await?)?;

    // Already the reaction record itself
    if uri.collection == collection {
        if uri.authority != client.did()? {
            return Err(AppError::InvalidInput(format!(
                "{} is not one of your records",
                uri
            )));
        }
        client.delete_record(collection, &uri.rkey).await?;
        return Ok(uri.to_string());
    }

    let subject_uri = uri.to_string();
    let record = client
        .find_own_record(collection, |value| {
            value.pointer("/subject/uri").and_then(Value::as_str) == Some(subject_uri.as_str())
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No {} record found for {}", collection, subject_uri)))?;

    client.delete_record(collection, record.rkey()).await?;
    Ok(record.uri)
}

pub async fn like_post(ctx: Arc<ToolContext>, args: PostRefArgs) -> Result<Value, AppError> {
    let target = check_post_ref(&args)?;

    let client = ctx.client().await?;
    let like = react(&client, LIKE, target, &args.cid).await?;

    info!("Liked {}", args.uri);
    Ok(json!({
        "status": "success",
        "message": "Post liked successfully",
        "like_uri": like.uri,
        "like_cid": like.cid,
    }))
}

pub async fn unlike_post(ctx: Arc<ToolContext>, args: PostUriArgs) -> Result<Value, AppError> {
    let target = PostTarget::parse(&args.uri)?;

    let client = ctx.client().await?;
    let removed = undo_reaction(&client, LIKE, target).await?;

    info!("Removed like {}", removed);
    Ok(json!({
        "status": "success",
        "message": "Post unliked successfully",
        "like_uri": removed,
    }))
}

pub async fn repost_post(ctx: Arc<ToolContext>, args: PostRefArgs) -> Result<Value, AppError> {
    let target = check_post_ref(&args)?;

    let client = ctx.client().await?;
    let repost = react(&client, REPOST, target, &args.cid).await?;

    info!("Reposted {}", args.uri);
    Ok(json!({
        "status": "success",
        "message": "Post reposted successfully",
        "repost_uri": repost.uri,
        "repost_cid": repost.cid,
    }))
}

pub async fn unrepost_post(ctx: Arc<ToolContext>, args: PostUriArgs) -> Result<Value, AppError> {
    let target = PostTarget::parse(&args.uri)?;

    let client = ctx.client().await?;
    let removed = undo_reaction(&client, REPOST, target).await?;

    info!("Removed repost {}", removed);
    Ok(json!({
        "status": "success",
        "message": "Post unreposted successfully",
        "repost_uri": removed,
    }))
}

async fn post_page(ctx: &ToolContext, nsid: &str, args: PostPageArgs) -> Result<Value, AppError> {
    let target = PostTarget::parse(&args.uri)?;

    let client = ctx.client().await?;
    let uri = target.resolve(&client).await?;
    let params = QueryParams::new()
        .with("uri", uri)
        .with_opt("cid", args.cid.filter(|c| !c.trim().is_empty()))
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor);
    client.query(nsid, &params).await
}

pub async fn get_likes(ctx: Arc<ToolContext>, args: PostPageArgs) -> Result<Value, AppError> {
    let likes = post_page(&ctx, "app.bsky.feed.getLikes", args).await?;
    Ok(success("likes", likes))
}

pub async fn get_reposted_by(ctx: Arc<ToolContext>, args: PostPageArgs) -> Result<Value, AppError> {
    let reposts = post_page(&ctx, "app.bsky.feed.getRepostedBy", args).await?;
    Ok(success("reposts", reposts))
}
