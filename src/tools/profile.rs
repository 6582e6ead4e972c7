//! Profile tools: profiles, follows and followers

use super::args::{clamp_limit, ActorPageArgs, HandleArgs, OptionalHandleArgs, DEFAULT_LIMIT};
use super::{success, ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::records::{actor_subject_record, FOLLOW};
use crate::bluesky::QueryParams;
use crate::error::{validate_actor, AppError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::authenticated(
            "get_profile",
            "profiles",
            "Get a user profile; defaults to the authenticated user",
        ),
        get_profile,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_follows",
            "profiles",
            "Get the accounts a user follows",
        ),
        get_follows,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_followers",
            "profiles",
            "Get the accounts following a user",
        ),
        get_followers,
    );
    registry.register(
        ToolMeta::authenticated("follow_user", "profiles", "Follow a user"),
        follow_user,
    );
}

pub async fn get_profile(ctx: Arc<ToolContext>, args: OptionalHandleArgs) -> Result<Value, AppError> {
    if let Some(handle) = args.handle.as_deref().filter(|h| !h.trim().is_empty()) {
        validate_actor(handle.trim())?;
    }

    let client = ctx.client().await?;
    let actor = client.actor_or_self(args.handle.as_deref())?;

    let profile: Value = client
        .query("app.bsky.actor.getProfile", &QueryParams::new().with("actor", actor))
        .await?;
    Ok(success("profile", profile))
}

pub async fn get_follows(ctx: Arc<ToolContext>, args: ActorPageArgs) -> Result<Value, AppError> {
    let follows = actor_page(&ctx, "app.bsky.graph.getFollows", args).await?;
    Ok(success("follows", follows))
}

pub async fn get_followers(ctx: Arc<ToolContext>, args: ActorPageArgs) -> Result<Value, AppError> {
    let followers = actor_page(&ctx, "app.bsky.graph.getFollowers", args).await?;
    Ok(success("followers", followers))
}

/// Shared shape of the `{actor, limit, cursor}` listing endpoints
pub(crate) async fn actor_page(
    ctx: &ToolContext,
    nsid: &str,
    args: ActorPageArgs,
) -> Result<Value, AppError> {
    if let Some(handle) = args.handle.as_deref().filter(|h| !h.trim().is_empty()) {
        validate_actor(handle.trim())?;
    }

    let client = ctx.client().await?;
    let actor = client.actor_or_self(args.handle.as_deref())?;
    let params = QueryParams::new()
        .with("actor", actor)
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor);
    client.query(nsid, &params).await
}

pub async fn follow_user(ctx: Arc<ToolContext>, args: HandleArgs) -> Result<Value, AppError> {
    validate_actor(&args.handle)?;

    let client = ctx.client().await?;
    let did = client.resolve_handle(&args.handle).await?;
    let created = client
        .create_record(FOLLOW, actor_subject_record(FOLLOW, &did))
        .await?;

    info!("Followed {} ({})", args.handle, did);
    Ok(json!({
        "status": "success",
        "message": format!("Now following {}", args.handle),
        "follow_uri": created.uri,
        "follow_cid": created.cid,
    }))
}
