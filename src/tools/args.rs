//! Argument types shared by several tools
//!
//! Tool arguments are plain serde structs; deserialising them is the argument
//! validation step, and their schemars schema is what tools/list advertises.

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Default page size for list endpoints
pub const DEFAULT_LIMIT: u32 = 50;

/// Default page size for search endpoints
pub const DEFAULT_SEARCH_LIMIT: u32 = 25;

/// Limits accept integers or numeric strings
pub fn deserialize_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match Option::<IntOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntOrString::Int(n)) => Ok(Some(n)),
        Some(IntOrString::Float(f)) => Ok(Some(f as i64)),
        Some(IntOrString::Str(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| {
            de::Error::custom(format!("invalid number '{}': expected an integer", s))
        }),
    }
}

/// Schema for numeric arguments that may arrive as strings
pub fn int_or_string_schema(_gen: &mut SchemaGenerator) -> Schema {
    SchemaObject {
        instance_type: Some(vec![InstanceType::Integer, InstanceType::String].into()),
        ..Default::default()
    }
    .into()
}

/// Clamp a requested page size into 1..=100
pub fn clamp_limit(limit: Option<i64>, default: u32) -> u32 {
    limit.map(|l| l.clamp(1, 100) as u32).unwrap_or(default)
}

/// Clamp a thread depth or parent height into 0..=1000
pub fn clamp_depth(value: Option<i64>, default: u32) -> u32 {
    value.map(|v| v.clamp(0, 1000) as u32).unwrap_or(default)
}

/// Arguments for tools that take none
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct NoArgs {}

/// A single required account
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct HandleArgs {
    /// Handle (alice.bsky.social) or DID (did:plc:...)
    #[schemars(description = "Handle (alice.bsky.social) or DID (did:plc:...)")]
    pub handle: String,
}

/// An optional account, defaulting to the authenticated user
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct OptionalHandleArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional handle or DID; defaults to the authenticated user")]
    pub handle: Option<String>,
}

/// Paginated listing for an optional account
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct ActorPageArgs {
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
}

/// Paginated listing for the authenticated account
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct PageArgs {
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

/// A post addressed by URI and CID
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct PostRefArgs {
    #[schemars(description = "AT URI of the post")]
    pub uri: String,

    #[schemars(description = "CID of the post")]
    pub cid: String,
}

/// A post addressed by URI, CID optional
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct PostUriArgs {
    #[schemars(description = "AT URI of the post")]
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional CID of the post")]
    pub cid: Option<String>,
}

/// Paginated listing about one post
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct PostPageArgs {
    #[schemars(description = "AT URI of the post")]
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional CID of the post (not strictly required)")]
    pub cid: Option<String>,

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

/// Search query with pagination
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct SearchArgs {
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
}

/// Parent (and optionally root) of a reply
#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct ReplyTo {
    #[schemars(description = "AT URI of the post being replied to")]
    pub uri: String,

    #[schemars(description = "CID of the post being replied to")]
    pub cid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "AT URI of the thread root, if different from the parent")]
    pub root_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "CID of the thread root, if different from the parent")]
    pub root_cid: Option<String>,
}
