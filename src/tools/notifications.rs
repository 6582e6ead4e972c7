//! Notification tools

use super::args::{clamp_limit, deserialize_limit, int_or_string_schema, NoArgs, DEFAULT_LIMIT};
use super::{ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::records::now_iso;
use crate::bluesky::QueryParams;
use crate::error::AppError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct NotificationsArgs {
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
    #[schemars(description = "Optional RFC 3339 timestamp used as the seen marker")]
    pub seen_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(
        description = "Optional notification type: mentions, replies, quotes, reposts, follows or likes"
    )]
    pub filter: Option<String>,
}

/// Map a filter name to the listNotifications `reasons` value
fn filter_reason(filter: &str) -> Option<&'static str> {
    match filter {
        "mentions" => Some("mention"),
        "replies" => Some("reply"),
        "quotes" => Some("quote"),
        "reposts" => Some("repost"),
        "follows" => Some("follow"),
        "likes" => Some("like"),
        _ => None,
    }
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::authenticated(
            "get_notifications",
            "notifications",
            "Get notifications for the authenticated user",
        ),
        get_notifications,
    );
    registry.register(
        ToolMeta::authenticated(
            "count_unread_notifications",
            "notifications",
            "Count unread notifications",
        ),
        count_unread_notifications,
    );
    registry.register(
        ToolMeta::authenticated(
            "mark_notifications_seen",
            "notifications",
            "Mark all notifications as seen",
        ),
        mark_notifications_seen,
    );
    registry.register(
        ToolMeta::authenticated(
            "get_notification_preferences",
            "notifications",
            "Get notification preferences",
        ),
        get_notification_preferences,
    );
}

pub async fn get_notifications(ctx: Arc<ToolContext>, args: NotificationsArgs) -> Result<Value, AppError> {
    let reason = match args.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => {
            let reason = filter_reason(filter);
            if reason.is_none() {
                warn!("Ignoring unknown notification filter '{}'", filter);
            }
            reason
        }
        None => None,
    };

    let client = ctx.client().await?;
    let params = QueryParams::new()
        .with("limit", clamp_limit(args.limit, DEFAULT_LIMIT))
        .with_opt("cursor", args.cursor)
        .with_opt("seenAt", args.seen_at)
        .with_opt("reasons", reason);
    let notifications: Value = client
        .query("app.bsky.notification.listNotifications", &params)
        .await?;
    Ok(super::success("notifications", notifications))
}

pub async fn count_unread_notifications(ctx: Arc<ToolContext>, _args: NoArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let response: Value = client
        .query("app.bsky.notification.getUnreadCount", &QueryParams::new())
        .await?;

    Ok(json!({
        "status": "success",
        "count": response.get("count").and_then(Value::as_u64).unwrap_or(0),
        "last_seen_at": response.get("seenAt").cloned().unwrap_or(Value::Null),
    }))
}

pub async fn mark_notifications_seen(ctx: Arc<ToolContext>, _args: NoArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let seen_at = now_iso();
    client
        .procedure_no_output("app.bsky.notification.updateSeen", &json!({"seenAt": seen_at}))
        .await?;

    Ok(json!({
        "status": "success",
        "message": "Notifications marked as seen",
        "seen_at": seen_at,
    }))
}

/// The notification entry from the account preferences, or the default
pub fn notification_preference(preferences: &[Value]) -> Value {
    preferences
        .iter()
        .find(|p| {
            p.get("$type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.starts_with("app.bsky.actor.defs#notification"))
        })
        .cloned()
        .unwrap_or_else(|| json!({"enabled": true}))
}

pub async fn get_notification_preferences(ctx: Arc<ToolContext>, _args: NoArgs) -> Result<Value, AppError> {
    let client = ctx.client().await?;
    let prefs: Value = client
        .query("app.bsky.actor.getPreferences", &QueryParams::new())
        .await?;
    let preferences = prefs
        .get("preferences")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(super::success("preferences", notification_preference(preferences)))
}
