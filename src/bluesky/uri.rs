//! AT URI and bsky.app URL parsing utilities

use crate::error::AppError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Parsed `at://{authority}/{collection}/{rkey}` record URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub authority: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Parse an at:// record URI
    ///
    /// Anything after the record key is ignored, so a URI carrying an extra
    /// path segment still resolves to its record.
    pub fn parse(uri: &str) -> Result<Self, AppError> {
        let rest = uri.trim().strip_prefix("at://").ok_or_else(|| {
            AppError::InvalidInput(format!("Invalid AT URI, expected at://...: {}", uri))
        })?;

        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
            return Err(AppError::InvalidInput(format!(
                "Invalid AT URI format: {}. Expected at://{{did}}/{{collection}}/{{rkey}}",
                uri
            )));
        }

        Ok(Self {
            authority: parts[0].to_string(),
            collection: parts[1].to_string(),
            rkey: parts[2].to_string(),
        })
    }

    pub fn is_did(&self) -> bool {
        self.authority.starts_with("did:")
    }
}

impl FromStr for AtUri {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.authority, self.collection, self.rkey)
    }
}

pub fn make_at_uri(did: &str, collection: &str, rkey: &str) -> String {
    format!("at://{}/{}/{}", did, collection, rkey)
}

/// A bsky.app web URL the server knows how to translate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BskyUrl {
    Post { actor: String, rkey: String },
    Profile { actor: String },
}

fn post_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.)?bsky\.app/profile/([^/?#]+)/post/([^/?#]+)")
            .expect("valid post URL regex")
    })
}

fn profile_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.)?bsky\.app/profile/([^/?#]+)")
            .expect("valid profile URL regex")
    })
}

impl BskyUrl {
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if let Some(caps) = post_url_regex().captures(url) {
            return Some(BskyUrl::Post {
                actor: caps[1].to_string(),
                rkey: caps[2].to_string(),
            });
        }
        profile_url_regex().captures(url).map(|caps| BskyUrl::Profile {
            actor: caps[1].to_string(),
        })
    }

    pub fn actor(&self) -> &str {
        match self {
            BskyUrl::Post { actor, .. } | BskyUrl::Profile { actor } => actor,
        }
    }
}

/// Convert AT URI to BlueSky web URL
/// at://did:plc:abc/app.bsky.feed.post/xyz -> https://bsky.app/profile/handle/post/xyz
/// Falls back to using DID in the URL if handle is empty
pub fn at_uri_to_bsky_url(at_uri: &str, handle: &str) -> String {
    let Ok(parsed) = AtUri::parse(at_uri) else {
        return at_uri.to_string();
    };

    let profile = if handle.is_empty() {
        parsed.authority.as_str()
    } else {
        handle
    };

    format!("https://bsky.app/profile/{}/post/{}", profile, parsed.rkey)
}
