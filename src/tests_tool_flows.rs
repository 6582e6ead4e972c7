//! End-to-end tool flows against an in-memory PDS
//!
//! `FakePds` keeps records per collection so that writes made by one tool
//! are visible to the next, and counts logins to check the session is
//! established once and reused. Only the access token from the latest login
//! is accepted.

use crate::auth::{Config, Session};
use crate::bluesky::records::{BLOCK, LIKE, POST, REPOST};
use crate::error::AppError;
use crate::tools::{build_registry, ToolContext, ToolRegistry};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const DID: &str = "did:plc:alice";
const HANDLE: &str = "alice.test";

#[derive(Default)]
struct PdsState {
    logins: usize,
    next_id: u64,
    /// (collection, rkey) -> (cid, record)
    records: BTreeMap<(String, String), (String, Value)>,
    uploads: Vec<String>,
    access_token: Option<String>,
    preferences: Vec<Value>,
    /// `reasons` sent with each listNotifications call
    notification_reasons: Vec<Vec<String>>,
}

#[derive(Clone, Default)]
struct FakePds {
    state: Arc<Mutex<PdsState>>,
}

fn error(status: u16, name: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"error": name, "message": message}))
}

fn query(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

impl FakePds {
    fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    fn revoke_token(&self) {
        self.state.lock().unwrap().access_token = None;
    }

    fn record(&self, collection: &str, rkey: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&(collection.to_string(), rkey.to_string()))
            .map(|(_, value)| value.clone())
    }

    fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .records
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    fn views(state: &PdsState, collection: &str) -> Vec<Value> {
        state
            .records
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((c, rkey), (cid, value))| {
                json!({"uri": format!("at://{}/{}/{}", DID, c, rkey), "cid": cid, "value": value})
            })
            .collect()
    }
}

impl Respond for FakePds {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let nsid = request.url.path().trim_start_matches("/xrpc/");
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        let bearer = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if let Some(token) = bearer {
            if state.access_token.as_deref() != Some(token) {
                return error(400, "ExpiredToken", "Token has expired");
            }
        }

        match nsid {
            "com.atproto.server.createSession" => {
                if body["password"] != "app-pass" {
                    return error(401, "AuthenticationRequired", "Invalid identifier or password");
                }
                state.logins += 1;
                let token = format!("access-{}", state.logins);
                state.access_token = Some(token.clone());
                ResponseTemplate::new(200).set_body_json(json!({
                    "accessJwt": token,
                    "refreshJwt": "refresh",
                    "handle": HANDLE,
                    "did": DID,
                }))
            }
            "com.atproto.identity.resolveHandle" => match query(request, "handle").as_deref() {
                Some(HANDLE) => ResponseTemplate::new(200).set_body_json(json!({"did": DID})),
                Some("bob.test") => ResponseTemplate::new(200).set_body_json(json!({"did": "did:plc:bob"})),
                _ => error(400, "InvalidRequest", "Unable to resolve handle"),
            },
            "com.atproto.repo.createRecord" => {
                state.next_id += 1;
                let collection = body["collection"].as_str().unwrap_or_default().to_string();
                let rkey = format!("3k{:04}", state.next_id);
                let cid = format!("bafyrecord{}", state.next_id);
                let uri = format!("at://{}/{}/{}", DID, collection, rkey);
                state
                    .records
                    .insert((collection, rkey), (cid.clone(), body["record"].clone()));
                ResponseTemplate::new(200).set_body_json(json!({"uri": uri, "cid": cid}))
            }
            "com.atproto.repo.deleteRecord" => {
                let key = (
                    body["collection"].as_str().unwrap_or_default().to_string(),
                    body["rkey"].as_str().unwrap_or_default().to_string(),
                );
                state.records.remove(&key);
                ResponseTemplate::new(200).set_body_json(json!({}))
            }
            "com.atproto.repo.getRecord" => {
                let repo = query(request, "repo").unwrap_or_default();
                let collection = query(request, "collection").unwrap_or_default();
                let rkey = query(request, "rkey").unwrap_or_default();
                match state.records.get(&(collection.clone(), rkey.clone())) {
                    Some((cid, value)) if repo == DID => ResponseTemplate::new(200).set_body_json(json!({
                        "uri": format!("at://{}/{}/{}", DID, collection, rkey),
                        "cid": cid,
                        "value": value,
                    })),
                    _ => error(400, "RecordNotFound", "Could not locate record"),
                }
            }
            "com.atproto.repo.listRecords" => {
                let collection = query(request, "collection").unwrap_or_default();
                ResponseTemplate::new(200)
                    .set_body_json(json!({"records": Self::views(&state, &collection)}))
            }
            "com.atproto.repo.uploadBlob" => {
                let mime = request
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                state.uploads.push(mime.clone());
                ResponseTemplate::new(200).set_body_json(json!({
                    "blob": {
                        "$type": "blob",
                        "ref": {"$link": "bafkblob"},
                        "mimeType": mime,
                        "size": request.body.len(),
                    }
                }))
            }
            "app.bsky.feed.getLikes" => {
                let uri = query(request, "uri").unwrap_or_default();
                let likes: Vec<Value> = Self::views(&state, LIKE)
                    .into_iter()
                    .filter(|view| view["value"]["subject"]["uri"] == uri.as_str())
                    .map(|view| {
                        json!({
                            "actor": {"did": DID, "handle": HANDLE},
                            "createdAt": view["value"]["createdAt"],
                        })
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({"uri": uri, "likes": likes}))
            }
            "app.bsky.actor.getProfile" => match query(request, "actor").as_deref() {
                Some("did:plc:bob") | Some("bob.test") => ResponseTemplate::new(200).set_body_json(
                    json!({"did": "did:plc:bob", "handle": "bob.test", "displayName": "Bob"}),
                ),
                _ => error(400, "InvalidRequest", "Profile not found"),
            },
            "app.bsky.actor.getPreferences" => ResponseTemplate::new(200)
                .set_body_json(json!({"preferences": state.preferences.clone()})),
            "app.bsky.feed.getFeedGenerator" => {
                let feed = query(request, "feed").unwrap_or_default();
                if feed.ends_with("/broken") {
                    return error(400, "InvalidRequest", "could not resolve feed generator");
                }
                ResponseTemplate::new(200).set_body_json(json!({
                    "view": {"uri": feed, "displayName": "Cats"},
                    "isOnline": true,
                    "isValid": true,
                }))
            }
            "app.bsky.notification.listNotifications" => {
                let reasons = request
                    .url
                    .query_pairs()
                    .filter(|(k, _)| k == "reasons")
                    .map(|(_, v)| v.into_owned())
                    .collect();
                state.notification_reasons.push(reasons);
                ResponseTemplate::new(200).set_body_json(json!({"notifications": []}))
            }
            "app.bsky.feed.getTimeline" => {
                ResponseTemplate::new(200).set_body_json(json!({"feed": []}))
            }
            other => error(501, "MethodNotImplemented", &format!("{} is not implemented", other)),
        }
    }
}

async fn start() -> (MockServer, FakePds, ToolRegistry, Arc<ToolContext>) {
    let server = MockServer::start().await;
    let pds = FakePds::default();
    Mock::given(path_regex("^/xrpc/"))
        .respond_with(pds.clone())
        .mount(&server)
        .await;

    let config = Config::new(Some(HANDLE.into()), Some("app-pass".into()), Some(server.uri()));
    let ctx = Arc::new(ToolContext::new(config, reqwest::Client::new()));
    (server, pds, build_registry(), ctx)
}

fn rkey(uri: &str) -> String {
    uri.rsplit('/').next().unwrap_or_default().to_string()
}

async fn create(registry: &ToolRegistry, ctx: &Arc<ToolContext>, args: Value) -> (String, String) {
    let out = registry.call(ctx.clone(), "create_post", args).await.unwrap();
    (
        out["post_uri"].as_str().unwrap().to_string(),
        out["post_cid"].as_str().unwrap().to_string(),
    )
}

async fn likes(registry: &ToolRegistry, ctx: &Arc<ToolContext>, uri: &str) -> usize {
    let out = registry
        .call(ctx.clone(), "get_likes", json!({"uri": uri}))
        .await
        .unwrap();
    out["likes"]["likes"].as_array().unwrap().len()
}

#[tokio::test]
async fn create_then_delete_post() {
    let (_server, pds, registry, ctx) = start().await;

    let out = registry
        .call(ctx.clone(), "create_post", json!({"text": "hello world"}))
        .await
        .unwrap();
    assert_eq!(out["status"], "success");
    let uri = out["post_uri"].as_str().unwrap().to_string();
    assert!(uri.starts_with("at://did:plc:alice/app.bsky.feed.post/"));
    assert_eq!(
        out["post_url"],
        format!("https://bsky.app/profile/{}/post/{}", HANDLE, rkey(&uri))
    );
    assert_eq!(pds.record(POST, &rkey(&uri)).unwrap()["text"], "hello world");

    let client = ctx.client().await.unwrap();
    assert!(client.get_record(DID, POST, &rkey(&uri)).await.is_ok());

    let out = registry
        .call(ctx.clone(), "delete_post", json!({"uri": uri}))
        .await
        .unwrap();
    assert_eq!(out["status"], "success");

    let err = client.get_record(DID, POST, &rkey(&uri)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(pds.logins(), 1);
}

#[tokio::test]
async fn like_then_unlike_restores_count() {
    let (_server, pds, registry, ctx) = start().await;
    let (uri, cid) = create(&registry, &ctx, json!({"text": "like me"})).await;

    assert_eq!(likes(&registry, &ctx, &uri).await, 0);

    let liked = registry
        .call(ctx.clone(), "like_post", json!({"uri": uri, "cid": cid}))
        .await
        .unwrap();
    let like_uri = liked["like_uri"].as_str().unwrap().to_string();
    assert!(like_uri.contains("/app.bsky.feed.like/"));
    assert_eq!(likes(&registry, &ctx, &uri).await, 1);

    let unliked = registry
        .call(ctx.clone(), "unlike_post", json!({"uri": uri}))
        .await
        .unwrap();
    assert_eq!(unliked["like_uri"], like_uri);
    assert_eq!(likes(&registry, &ctx, &uri).await, 0);
    assert_eq!(pds.count(LIKE), 0);

    let err = registry
        .call(ctx.clone(), "unlike_post", json!({"uri": uri}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(pds.logins(), 1);
}

#[tokio::test]
async fn repost_from_web_url_and_undo_by_record_uri() {
    let (_server, pds, registry, ctx) = start().await;
    let (uri, cid) = create(&registry, &ctx, json!({"text": "share me"})).await;
    let url = format!("https://bsky.app/profile/{}/post/{}", HANDLE, rkey(&uri));

    let out = registry
        .call(ctx.clone(), "repost_post", json!({"uri": url, "cid": cid}))
        .await
        .unwrap();
    let repost_uri = out["repost_uri"].as_str().unwrap().to_string();
    let record = pds.record(REPOST, &rkey(&repost_uri)).unwrap();
    assert_eq!(record["subject"]["uri"], uri.as_str());
    assert_eq!(record["subject"]["cid"], cid.as_str());

    let out = registry
        .call(ctx.clone(), "unrepost_post", json!({"uri": repost_uri}))
        .await
        .unwrap();
    assert_eq!(out["repost_uri"], repost_uri);
    assert_eq!(pds.count(REPOST), 0);
}

#[tokio::test]
async fn replies_inherit_the_thread_root() {
    let (_server, pds, registry, ctx) = start().await;
    let (root_uri, root_cid) = create(&registry, &ctx, json!({"text": "root"})).await;
    let (parent_uri, parent_cid) = create(
        &registry,
        &ctx,
        json!({"text": "first reply", "reply_to": {"uri": root_uri, "cid": root_cid}}),
    )
    .await;
    let (reply_uri, _) = create(
        &registry,
        &ctx,
        json!({"text": "second reply", "reply_to": {"uri": parent_uri, "cid": parent_cid}}),
    )
    .await;

    let first = pds.record(POST, &rkey(&parent_uri)).unwrap();
    assert_eq!(first["reply"]["root"]["uri"], root_uri.as_str());
    assert_eq!(first["reply"]["parent"]["uri"], root_uri.as_str());

    let second = pds.record(POST, &rkey(&reply_uri)).unwrap();
    assert_eq!(second["reply"]["root"]["uri"], root_uri.as_str());
    assert_eq!(second["reply"]["root"]["cid"], root_cid.as_str());
    assert_eq!(second["reply"]["parent"]["uri"], parent_uri.as_str());
}

#[tokio::test]
async fn send_image_uploads_blob_and_embeds_it() {
    let (_server, pds, registry, ctx) = start().await;
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    let out = registry
        .call(
            ctx.clone(),
            "send_image",
            json!({"text": "look", "image_data": STANDARD.encode(png), "alt_text": "a square"}),
        )
        .await
        .unwrap();

    let record = pds
        .record(POST, &rkey(out["post_uri"].as_str().unwrap()))
        .unwrap();
    assert_eq!(record["embed"]["$type"], "app.bsky.embed.images");
    assert_eq!(record["embed"]["images"][0]["alt"], "a square");
    assert_eq!(record["embed"]["images"][0]["image"]["mimeType"], "image/png");
    assert_eq!(pds.state.lock().unwrap().uploads, vec!["image/png".to_string()]);
}

#[tokio::test]
async fn cannot_delete_someone_elses_post() {
    let (_server, pds, registry, ctx) = start().await;
    let err = registry
        .call(
            ctx.clone(),
            "delete_post",
            json!({"uri": "at://did:plc:bob/app.bsky.feed.post/3abc"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(ref m) if m.contains("your own posts")));
    assert_eq!(pds.count(POST), 0);
}

#[tokio::test]
async fn public_tools_work_without_logging_in() {
    let (_server, pds, registry, ctx) = start().await;

    let out = registry
        .call(
            ctx.clone(),
            "convert_url_to_uri",
            json!({"url": "https://bsky.app/profile/bob.test/post/3abc"}),
        )
        .await
        .unwrap();
    assert_eq!(out["uri"], "at://did:plc:bob/app.bsky.feed.post/3abc");

    let out = registry
        .call(
            ctx.clone(),
            "convert_url_to_uri",
            json!({"url": "https://bsky.app/profile/bob.test"}),
        )
        .await
        .unwrap();
    assert_eq!(out["uri"], "did:plc:bob");

    let out = registry
        .call(ctx.clone(), "resolve_handle", json!({"handle": "@bob.test"}))
        .await
        .unwrap();
    assert_eq!(out["did"], "did:plc:bob");

    let err = registry
        .call(ctx.clone(), "resolve_handle", json!({"handle": "nobody.test"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RemoteService { .. }));

    assert_eq!(pds.logins(), 0);
}

#[tokio::test]
async fn wrong_password_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(path_regex("^/xrpc/"))
        .respond_with(FakePds::default())
        .mount(&server)
        .await;
    let config = Config::new(Some(HANDLE.into()), Some("wrong".into()), Some(server.uri()));
    let ctx = Arc::new(ToolContext::new(config, reqwest::Client::new()));

    let err = build_registry()
        .call(ctx.clone(), "get_timeline_posts", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));

    let status = build_registry()
        .call(ctx, "check_auth_status", json!({}))
        .await
        .unwrap();
    assert!(status.to_string().contains("Invalid identifier or password"));
}

#[tokio::test]
async fn expired_session_is_not_used_for_public_lookups() {
    let (server, pds, registry, ctx) = start().await;
    ctx.auth
        .install_session(Session {
            access_jwt: "stale".into(),
            refresh_jwt: "stale-refresh".into(),
            handle: HANDLE.into(),
            did: DID.into(),
            service: server.uri(),
            expires_at: Some(Utc::now() - Duration::hours(1)),
        })
        .await;

    let out = registry
        .call(
            ctx.clone(),
            "convert_url_to_uri",
            json!({"url": "https://bsky.app/profile/bob.test"}),
        )
        .await
        .unwrap();
    assert_eq!(out["uri"], "did:plc:bob");
    assert_eq!(pds.logins(), 0);

    // The stale refresh token is rejected too, so this logs in
    registry
        .call(ctx.clone(), "get_timeline_posts", json!({}))
        .await
        .unwrap();
    assert_eq!(pds.logins(), 1);
}

#[tokio::test]
async fn rejected_token_is_dropped_and_next_call_logs_in_again() {
    let (_server, pds, registry, ctx) = start().await;
    registry
        .call(ctx.clone(), "get_timeline_posts", json!({}))
        .await
        .unwrap();
    pds.revoke_token();

    let err = registry
        .call(ctx.clone(), "get_timeline_posts", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));
    assert!(!ctx.auth.is_authenticated().await);

    let out = registry
        .call(ctx.clone(), "get_timeline_posts", json!({}))
        .await
        .unwrap();
    assert_eq!(out["status"], "success");
    assert_eq!(pds.logins(), 2);
}

#[tokio::test]
async fn rejected_token_on_public_tool_falls_back_to_anonymous() {
    let (_server, pds, registry, ctx) = start().await;
    registry
        .call(ctx.clone(), "get_timeline_posts", json!({}))
        .await
        .unwrap();
    pds.revoke_token();

    let err = registry
        .call(ctx.clone(), "resolve_handle", json!({"handle": "bob.test"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));

    let out = registry
        .call(ctx.clone(), "resolve_handle", json!({"handle": "bob.test"}))
        .await
        .unwrap();
    assert_eq!(out["did"], "did:plc:bob");
    assert_eq!(pds.logins(), 1);
}

#[tokio::test]
async fn unblock_without_block_record_is_not_found() {
    let (_server, pds, registry, ctx) = start().await;
    let err = registry
        .call(ctx.clone(), "unblock_user", json!({"handle": "bob.test"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m.contains("@bob.test")));
    assert_eq!(pds.count(BLOCK), 0);
}

#[tokio::test]
async fn blocks_list_keeps_entries_whose_profile_is_missing() {
    let (_server, pds, registry, ctx) = start().await;
    for handle in ["bob.test", "did:plc:ghost"] {
        let out = registry
            .call(ctx.clone(), "block_user", json!({"handle": handle}))
            .await
            .unwrap();
        assert!(out["block_uri"].as_str().unwrap().contains("/app.bsky.graph.block/"));
    }

    let out = registry
        .call(ctx.clone(), "get_blocks", json!({}))
        .await
        .unwrap();
    let blocks = out["blocks_data"]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["did"], "did:plc:bob");
    assert_eq!(blocks[0]["profile"]["displayName"], "Bob");
    assert_eq!(blocks[1]["did"], "did:plc:ghost");
    assert!(blocks[1].get("profile").is_none());

    registry
        .call(ctx.clone(), "unblock_user", json!({"handle": "@bob.test"}))
        .await
        .unwrap();
    assert_eq!(pds.count(BLOCK), 1);
}

#[tokio::test]
async fn saved_feeds_skip_generators_that_fail() {
    let (_server, pds, registry, ctx) = start().await;
    pds.state.lock().unwrap().preferences = vec![json!({
        "$type": "app.bsky.actor.defs#savedFeedsPrefV2",
        "items": [
            {"type": "timeline", "value": "following", "pinned": true, "id": "1"},
            {"type": "feed", "value": "at://did:plc:a/app.bsky.feed.generator/cats", "pinned": false, "id": "2"},
            {"type": "feed", "value": "at://did:plc:a/app.bsky.feed.generator/broken", "pinned": true, "id": "3"}
        ]
    })];

    let out = registry
        .call(ctx.clone(), "get_pinned_feeds", json!({}))
        .await
        .unwrap();
    let feeds = out["pinned_feeds"].as_array().unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0]["uri"], "at://did:plc:a/app.bsky.feed.generator/cats");
    assert_eq!(feeds[0]["info"]["view"]["displayName"], "Cats");
}

#[tokio::test]
async fn notification_filter_maps_to_reasons() {
    let (_server, pds, registry, ctx) = start().await;
    for filter in ["mentions", "bogus"] {
        let out = registry
            .call(ctx.clone(), "get_notifications", json!({"filter": filter}))
            .await
            .unwrap();
        assert_eq!(out["status"], "success");
    }

    assert_eq!(
        pds.state.lock().unwrap().notification_reasons,
        vec![vec!["mention".to_string()], Vec::<String>::new()]
    );
}
