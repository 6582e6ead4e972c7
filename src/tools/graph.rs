//! Social graph moderation tools: blocks and mutes

use super::args::{clamp_limit, HandleArgs, PageArgs, DEFAULT_LIMIT};
use super::{success, ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::records::{actor_subject_record, BLOCK};
use crate::bluesky::QueryParams;
use crate::error::{validate_actor, AppError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::authenticated("block_user", "moderation", "Block a user"),
        block_user,
    );
    registry.register(
        ToolMeta::authenticated(
            "unblock_user",
            "moderation",
            "Unblock a previously blocked user",
        ),
        unblock_user,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_blocks",
            "moderation",
            "List users blocked by the authenticated user",
        ),
        get_blocks,
    );
    registry.register(
        ToolMeta::authenticated("mute_user", "moderation", "Mute a user"),
        mute_user,
    );
    registry.register(
        ToolMeta::authenticated("unmute_user", "moderation", "Unmute a previously muted user"),
        unmute_user,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_mutes",
            "moderation",
            "List users muted by the authenticated user",
        ),
        get_mutes,
    );
}

pub async fn block_user(ctx: Arc<ToolContext>, args: HandleArgs) -> Result<Value, AppError> {
    validate_actor(&args.handle)?;

    let client = ctx.client().await?;
    let did = client.resolve_handle(&args.handle).await?;
    let created = client
        .create_record(BLOCK, actor_subject_record(BLOCK, &did))
        .await?;

    info!("Blocked {} ({})", args.handle, did);
    Ok(json!({
        "status": "success",
        "message": format!("Blocked user @{}", display_handle(&args.handle)),
        "block_uri": created.uri,
    }))
}

pub async fn unblock_user(ctx: Arc<ToolContext>, args: HandleArgs) -> Result<Value, AppError> {
    validate_actor(&args.handle)?;

    let client = ctx.client().await?;
    let did = client.resolve_handle(&args.handle).await?;

    let record = client
        .find_own_record(BLOCK, |value| value.get("subject").and_then(Value::as_str) == Some(did.as_str()))
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No block record found for @{}",
                display_handle(&args.handle)
            ))
        })?;

    client.delete_record(BLOCK, record.rkey()).await?;

    info!("Unblocked {} ({})", args.handle, did);
    Ok(json!({
        "status": "success",
        "message": format!("Unblocked user @{}", display_handle(&args.handle)),
    }))
}

/// Own block records, each enriched with the blocked account's profile
pub async fn get_blocks(ctx: Arc<ToolContext>, args: PageArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let did = client.did()?.to_string();

    let page = client
        .list_records(
            &did,
            BLOCK,
            clamp_limit(args.limit, DEFAULT_LIMIT),
            args.cursor.as_deref(),
        )
        .await?;

    let mut blocks = Vec::with_capacity(page.records.len());
    for record in page.records {
        let subject = record
            .value
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut entry = json!({
            "uri": record.uri,
            "did": subject,
        });
        if let Some(created_at) = record.value.get("createdAt") {
            entry["created_at"] = created_at.clone();
        }

        if !subject.is_empty() {
            match client
                .query::<Value>(
                    "app.bsky.actor.getProfile",
                    &QueryParams::new().with("actor", &subject),
                )
                .await
            {
                Ok(profile) => entry["profile"] = profile,
                Err(e) => warn!("Profile lookup for blocked {} failed: {}", subject, e),
            }
        }
        blocks.push(entry);
    }

    Ok(success(
        "blocks_data",
        json!({
            "blocks": blocks,
            "cursor": page.cursor,
        }),
    ))
}

pub async fn mute_user(ctx: Arc<ToolContext>, args: HandleArgs) -> Result<Value, AppError> {
    validate_actor(&args.handle)?;

    let client = ctx.client().await?;
    let did = client.resolve_handle(&args.handle).await?;
    client
        .procedure_no_output("app.bsky.graph.muteActor", &json!({"actor": did}))
        .await?;

    Ok(json!({
        "status": "success",
        "message": format!("Muted user @{}", display_handle(&args.handle)),
    }))
}

pub async fn unmute_user(ctx: Arc<ToolContext>, args: HandleArgs) -> Result<Value, AppError> {
    validate_actor(&args.handle)?;

    let client = ctx.client().await?;
    let did = client.resolve_handle(&args.handle).await?;
    client
        .procedure_no_output("app.bsky.graph.unmuteActor", &json!({"actor": did}))
        .await?;

    Ok(json!({
        "status": "success",
        "message": format!("Unmuted user @{}", display_handle(&args.handle)),
    }))
}

pub async fn get_mutes(ctx: Arc<ToolContext>, args: PageArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor);
    let mutes: Value = client.query("app.bsky.graph.getMutes", &params).await?;
    Ok(success("mutes", mutes))
}

fn display_handle(handle: &str) -> &str {
    let handle = handle.trim();
    handle.strip_prefix('@').unwrap_or(handle)
}
