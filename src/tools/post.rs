//! Post tools: creating posts with replies, media, quotes and links, and deleting them

use super::args::{PostRefArgs, ReplyTo};
use super::util::PostTarget;
use super::{ToolContext, ToolMeta, ToolRegistry};
use crate::bluesky::records::{
    external_embed, images_embed, post_record, quote_embed, record_with_media, sniff_mime,
    video_embed, ExternalLink, ReplyRef, StrongRef, POST,
};
use crate::bluesky::uri::{at_uri_to_bsky_url, AtUri};
use crate::bluesky::BskyClient;
use crate::error::AppError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Bluesky accepts at most four images per post
pub const MAX_IMAGES: usize = 4;

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct ImageInput {
    #[schemars(description = "Base64-encoded image data")]
    pub image_data: String,

    #[serde(default, alias = "alt_text")]
    #[schemars(description = "Alternative text describing the image")]
    pub alt: String,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct LinkInput {
    #[schemars(description = "URL of the link")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional title for the link card")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional description for the link card")]
    pub description: Option<String>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct CreatePostArgs {
    #[schemars(description = "Text content of the post")]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional post to reply to: uri, cid and optionally root_uri, root_cid")]
    pub reply_to: Option<ReplyTo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional images (up to 4), each with image_data (base64) and alt")]
    pub images: Option<Vec<ImageInput>>,

    #[serde(default, alias = "quotes", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional post to quote: uri and cid")]
    pub quote: Option<PostRefArgs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional links; the first becomes a link card when there is no other embed")]
    pub links: Option<Vec<LinkInput>>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct SendImageArgs {
    #[schemars(description = "Text content of the post")]
    pub text: String,

    #[schemars(description = "Base64-encoded image data")]
    pub image_data: String,

    #[serde(default)]
    #[schemars(description = "Alternative text describing the image")]
    pub alt_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional post to reply to: uri, cid and optionally root_uri, root_cid")]
    pub reply_to: Option<ReplyTo>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct SendImagesArgs {
    #[schemars(description = "Text content of the post")]
    pub text: String,

    #[schemars(description = "Images (1-4), each with image_data (base64) and alt")]
    pub images: Vec<ImageInput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional post to reply to: uri, cid and optionally root_uri, root_cid")]
    pub reply_to: Option<ReplyTo>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct SendVideoArgs {
    #[schemars(description = "Text content of the post")]
    pub text: String,

    #[schemars(description = "Base64-encoded video data")]
    pub video_data: String,

    #[serde(default)]
    #[schemars(description = "Alternative text describing the video")]
    pub alt_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional post to reply to: uri, cid and optionally root_uri, root_cid")]
    pub reply_to: Option<ReplyTo>,
}

#[derive(JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct DeletePostArgs {
    #[schemars(description = "AT URI of the post to delete; must belong to the authenticated user")]
    pub uri: String,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::authenticated(
            "create_post",
            "posts",
            "Create a post, optionally replying, quoting, or attaching images and a link card",
        ),
        create_post,
    );
    registry.register(
        ToolMeta::authenticated("send_image", "posts", "Create a post with a single image"),
        send_image,
    );
    registry.register(
        ToolMeta::authenticated(
            "send_images",
            "posts",
            "Create a post with multiple images (up to 4)",
        ),
        send_images,
    );
    registry.register(
        ToolMeta::authenticated("send_video", "posts", "Create a post with a video"),
        send_video,
    );
    registry.register(
        ToolMeta::authenticated(
            "delete_post",
            "posts",
            "Delete a post created by the authenticated user",
        ),
        delete_post,
    );
}

/// Media decoded and ready to upload
struct Media {
    bytes: Vec<u8>,
    mime_type: &'static str,
    alt: String,
}

/// Everything needed to publish one post, validated before any network call
#[derive(Default)]
struct Draft {
    text: String,
    reply: Option<ReplyTo>,
    images: Vec<Media>,
    video: Option<Media>,
    quote: Option<StrongRef>,
    link: Option<ExternalLink>,
}

/// Decode base64 media, tolerating a `data:...;base64,` prefix and line breaks
pub fn decode_base64(data: &str, what: &str) -> Result<Vec<u8>, AppError> {
    let data = data.trim();
    let data = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| AppError::InvalidInput(format!("Failed to decode {} data: {}", what, e)))?;
    if bytes.is_empty() {
        return Err(AppError::InvalidInput(format!("{} data is empty", what)));
    }
    Ok(bytes)
}

fn decode_images(images: Vec<ImageInput>) -> Result<Vec<Media>, AppError> {
    if images.len() > MAX_IMAGES {
        return Err(AppError::InvalidInput(format!(
            "Maximum of {} images allowed",
            MAX_IMAGES
        )));
    }
    images
        .into_iter()
        .map(|image| {
            if image.image_data.trim().is_empty() {
                return Err(AppError::InvalidInput(
                    "Each image must contain 'image_data' with base64 encoded content".to_string(),
                ));
            }
            let bytes = decode_base64(&image.image_data, "image")?;
            Ok(Media {
                mime_type: sniff_mime(&bytes).unwrap_or("image/jpeg"),
                bytes,
                alt: image.alt,
            })
        })
        .collect()
}

fn check_reply(reply: &Option<ReplyTo>) -> Result<(), AppError> {
    if let Some(reply) = reply {
        AtUri::parse(&reply.uri)?;
        if reply.cid.trim().is_empty() {
            return Err(AppError::InvalidInput("reply_to.cid cannot be empty".to_string()));
        }
        if let Some(root) = &reply.root_uri {
            AtUri::parse(root)?;
        }
    }
    Ok(())
}

impl Draft {
    fn new(text: String, reply: Option<ReplyTo>) -> Result<Self, AppError> {
        check_reply(&reply)?;
        Ok(Self {
            text,
            reply,
            ..Default::default()
        })
    }

    fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
            || !self.images.is_empty()
            || self.video.is_some()
            || self.quote.is_some()
            || self.link.is_some()
    }
}

pub async fn create_post(ctx: Arc<ToolContext>, args: CreatePostArgs) -> Result<Value, AppError> {
    let mut draft = Draft::new(args.text, args.reply_to)?;
    draft.images = decode_images(args.images.unwrap_or_default())?;

    if let Some(quote) = args.quote {
        AtUri::parse(&quote.uri)?;
        draft.quote = Some(StrongRef::new(quote.uri.trim(), quote.cid.trim()));
    }

    if let Some(link) = args.links.unwrap_or_default().into_iter().next() {
        let url = link.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::InvalidInput(format!("Invalid link URL: {}", url)));
        }
        draft.link = Some(ExternalLink {
            uri: url.to_string(),
            title: link.title.unwrap_or_else(|| url.to_string()),
            description: link.description.unwrap_or_default(),
        });
    }

    publish(&ctx, draft, "Post created successfully").await
}

pub async fn send_image(ctx: Arc<ToolContext>, args: SendImageArgs) -> Result<Value, AppError> {
    let mut draft = Draft::new(args.text, args.reply_to)?;
    draft.images = decode_images(vec![ImageInput {
        image_data: args.image_data,
        alt: args.alt_text,
    }])?;

    publish(&ctx, draft, "Post with image created successfully").await
}

pub async fn send_images(ctx: Arc<ToolContext>, args: SendImagesArgs) -> Result<Value, AppError> {
    if args.images.is_empty() {
        return Err(AppError::InvalidInput("At least one image is required".to_string()));
    }
    let mut draft = Draft::new(args.text, args.reply_to)?;
    draft.images = decode_images(args.images)?;

    publish(&ctx, draft, "Post with images created successfully").await
}

pub async fn send_video(ctx: Arc<ToolContext>, args: SendVideoArgs) -> Result<Value, AppError> {
    let mut draft = Draft::new(args.text, args.reply_to)?;
    let bytes = decode_base64(&args.video_data, "video")?;
    draft.video = Some(Media {
        mime_type: sniff_mime(&bytes)
            .filter(|m| m.starts_with("video/"))
            .unwrap_or("video/mp4"),
        bytes,
        alt: args.alt_text,
    });

    publish(&ctx, draft, "Post with video created successfully").await
}

/// Reply reference with the root filled in from the parent when not supplied
async fn resolve_reply(client: &BskyClient, reply: ReplyTo) -> Result<ReplyRef, AppError> {
    let parent = StrongRef::new(reply.uri.trim(), reply.cid.trim());

    let root = match (reply.root_uri, reply.root_cid) {
        (Some(uri), Some(cid)) if !uri.trim().is_empty() && !cid.trim().is_empty() => {
            StrongRef::new(uri.trim(), cid.trim())
        }
        _ => {
            let at = AtUri::parse(&parent.uri)?;
            let record = client.get_record(&at.authority, &at.collection, &at.rkey).await?;
            record
                .value
                .pointer("/reply/root")
                .and_then(|root| serde_json::from_value::<StrongRef>(root.clone()).ok())
                .unwrap_or_else(|| parent.clone())
        }
    };

    Ok(ReplyRef { root, parent })
}

async fn publish(ctx: &ToolContext, draft: Draft, message: &str) -> Result<Value, AppError> {
    if !draft.has_content() {
        return Err(AppError::InvalidInput("Post text cannot be empty".to_string()));
    }

    let client = ctx.client().await?;

    let reply = match draft.reply {
        Some(reply) => Some(resolve_reply(&client, reply).await?),
        None => None,
    };

    let media = if let Some(video) = draft.video {
        let blob = client.upload_blob(video.bytes, video.mime_type).await?;
        Some(video_embed(blob, &video.alt))
    } else if !draft.images.is_empty() {
        let mut uploaded = Vec::with_capacity(draft.images.len());
        for image in draft.images {
            debug!(size = image.bytes.len(), mime = image.mime_type, "uploading image");
            let blob = client.upload_blob(image.bytes, image.mime_type).await?;
            uploaded.push((blob, image.alt));
        }
        Some(images_embed(uploaded))
    } else {
        None
    };

    let embed = match (media, &draft.quote) {
        (Some(media), Some(quote)) => Some(record_with_media(quote, media)),
        (Some(media), None) => Some(media),
        (None, Some(quote)) => Some(quote_embed(quote)),
        (None, None) => draft.link.as_ref().map(external_embed),
    };

    let record = post_record(&draft.text, reply.as_ref(), embed);
    let created = client.create_record(POST, record).await?;
    let handle = &client.session()?.handle;

    info!("Created post {}", created.uri);
    Ok(json!({
        "status": "success",
        "message": message,
        "post_uri": created.uri,
        "post_cid": created.cid,
        "post_url": at_uri_to_bsky_url(&created.uri, handle),
    }))
}

pub async fn delete_post(ctx: Arc<ToolContext>, args: DeletePostArgs) -> Result<Value, AppError> {
    let target = PostTarget::parse(&args.uri)?;

    let client = ctx.client().await?;
    let uri = AtUri::parse(&target.resolve(&client).await?)?;

    if uri.authority != client.did()? {
        return Err(AppError::InvalidInput(
            "You can only delete your own posts".to_string(),
        ));
    }
    if uri.collection != POST {
        return Err(AppError::InvalidInput(format!(
            "Not a post URI: {}",
            args.uri
        )));
    }

    client.delete_record(POST, &uri.rkey).await?;

    info!("Deleted post {}", uri);
    Ok(json!({
        "status": "success",
        "message": "Post deleted successfully",
    }))
}
