//! Record builders for the app.bsky collections this server writes

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const POST: &str = "app.bsky.feed.post";
pub const LIKE: &str = "app.bsky.feed.like";
pub const REPOST: &str = "app.bsky.feed.repost";
pub const FOLLOW: &str = "app.bsky.graph.follow";
pub const BLOCK: &str = "app.bsky.graph.block";

/// Current time as RFC 3339 with millisecond precision and a `Z` suffix
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// com.atproto.repo.strongRef
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

impl StrongRef {
    pub fn new(uri: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cid: cid.into(),
        }
    }
}

/// app.bsky.feed.post#replyRef
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: StrongRef,
    pub parent: StrongRef,
}

/// An external link card
#[derive(Debug, Clone, Default)]
pub struct ExternalLink {
    pub uri: String,
    pub title: String,
    pub description: String,
}

pub fn post_record(text: &str, reply: Option<&ReplyRef>, embed: Option<Value>) -> Value {
    let mut record = json!({
        "$type": POST,
        "text": text,
        "createdAt": now_iso(),
    });
    if let Some(reply) = reply {
        record["reply"] = json!(reply);
    }
    if let Some(embed) = embed {
        record["embed"] = embed;
    }
    record
}

/// Like or repost record pointing at a post
pub fn subject_record(collection: &str, subject: &StrongRef) -> Value {
    json!({
        "$type": collection,
        "subject": subject,
        "createdAt": now_iso(),
    })
}

/// Follow or block record pointing at an account
pub fn actor_subject_record(collection: &str, did: &str) -> Value {
    json!({
        "$type": collection,
        "subject": did,
        "createdAt": now_iso(),
    })
}

/// app.bsky.embed.images from uploaded blobs and their alt texts
pub fn images_embed(images: Vec<(Value, String)>) -> Value {
    let images: Vec<Value> = images
        .into_iter()
        .map(|(blob, alt)| json!({"image": blob, "alt": alt}))
        .collect();
    json!({
        "$type": "app.bsky.embed.images",
        "images": images,
    })
}

pub fn video_embed(blob: Value, alt: &str) -> Value {
    let mut embed = json!({
        "$type": "app.bsky.embed.video",
        "video": blob,
    });
    if !alt.is_empty() {
        embed["alt"] = json!(alt);
    }
    embed
}

pub fn quote_embed(quoted: &StrongRef) -> Value {
    json!({
        "$type": "app.bsky.embed.record",
        "record": quoted,
    })
}

/// Quote plus media in one embed
pub fn record_with_media(quoted: &StrongRef, media: Value) -> Value {
    json!({
        "$type": "app.bsky.embed.recordWithMedia",
        "record": quote_embed(quoted),
        "media": media,
    })
}

pub fn external_embed(link: &ExternalLink) -> Value {
    json!({
        "$type": "app.bsky.embed.external",
        "external": {
            "uri": link.uri,
            "title": link.title,
            "description": link.description,
        }
    })
}

/// Guess a MIME type from leading magic bytes
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some("video/mp4"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some("video/webm"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_format() {
        let stamp = now_iso();
        assert!(stamp.ends_with('Z'));
        // 2024-01-01T00:00:00.000Z
        assert_eq!(stamp.len(), 24);
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[test]
    fn test_post_record_with_reply() {
        let reply = ReplyRef {
            root: StrongRef::new("at://did:plc:a/app.bsky.feed.post/root", "cidroot"),
            parent: StrongRef::new("at://did:plc:b/app.bsky.feed.post/parent", "cidparent"),
        };
        let record = post_record("hello", Some(&reply), None);
        assert_eq!(record["$type"], POST);
        assert_eq!(record["text"], "hello");
        assert_eq!(record["reply"]["root"]["cid"], "cidroot");
        assert_eq!(record["reply"]["parent"]["uri"], "at://did:plc:b/app.bsky.feed.post/parent");
        assert!(record.get("embed").is_none());
    }

    #[test]
    fn test_record_with_media_nests_quote() {
        let quoted = StrongRef::new("at://did:plc:a/app.bsky.feed.post/q", "cidq");
        let media = images_embed(vec![(json!({"ref": "blob"}), "a cat".to_string())]);
        let embed = record_with_media(&quoted, media);
        assert_eq!(embed["$type"], "app.bsky.embed.recordWithMedia");
        assert_eq!(embed["record"]["$type"], "app.bsky.embed.record");
        assert_eq!(embed["record"]["record"]["cid"], "cidq");
        assert_eq!(embed["media"]["images"][0]["alt"], "a cat");
    }

    #[test]
    fn test_subject_records() {
        let like = subject_record(LIKE, &StrongRef::new("at://x/app.bsky.feed.post/1", "c1"));
        assert_eq!(like["subject"]["uri"], "at://x/app.bsky.feed.post/1");
        let follow = actor_subject_record(FOLLOW, "did:plc:bob");
        assert_eq!(follow["subject"], "did:plc:bob");
        assert_eq!(follow["$type"], FOLLOW);
    }

    #[test]
    fn test_video_embed_alt_optional() {
        assert!(video_embed(json!({}), "").get("alt").is_none());
        assert_eq!(video_embed(json!({}), "clip")["alt"], "clip");
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0x0D]), Some("image/png"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"\0\0\0\x18ftypmp42"), Some("video/mp4"));
        assert_eq!(sniff_mime(b"hello"), None);
    }
}
