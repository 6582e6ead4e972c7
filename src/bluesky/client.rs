//! Thin XRPC client over reqwest
//!
//! Queries and procedures go to `{service}/xrpc/{nsid}`. Every non-2xx
//! response is translated into an `AppError` so tool handlers only ever see
//! the error taxonomy, never raw HTTP statuses.

use crate::auth::Session;
use crate::bluesky::records::StrongRef;
use crate::error::AppError;
use crate::http::UPLOAD_TIMEOUT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Query string parameters; repeated keys are allowed for array params
#[derive(Debug, Default, Clone)]
pub struct QueryParams(Vec<(&'static str, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.0.push((key, value.to_string()));
        self
    }

    pub fn with_opt<V: ToString>(self, key: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn as_slice(&self) -> &[(&'static str, String)] {
        &self.0
    }
}

/// A record as returned by getRecord / listRecords
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordView {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    pub value: Value,
}

impl RecordView {
    /// Record key, the last path segment of the URI
    pub fn rkey(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListRecordsResponse {
    #[serde(default)]
    pub records: Vec<RecordView>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Upper bound on listRecords pages scanned when looking for one of our own records
const MAX_SCAN_PAGES: usize = 10;

/// Bluesky XRPC client, optionally carrying a session
pub struct BskyClient {
    http: Client,
    service: String,
    session: Option<Session>,
}

impl BskyClient {
    /// Unauthenticated client against the given service
    pub fn new(http: Client, service: impl Into<String>) -> Self {
        let service: String = service.into();
        Self {
            http,
            service: service.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    /// Authenticated client talking to the session's own service
    pub fn with_session(http: Client, session: Session) -> Self {
        Self {
            http,
            service: session.service.trim_end_matches('/').to_string(),
            session: Some(session),
        }
    }

    pub fn session(&self) -> Result<&Session, AppError> {
        self.session
            .as_ref()
            .ok_or_else(|| AppError::Authentication("Not authenticated".to_string()))
    }

    /// DID of the authenticated account
    pub fn did(&self) -> Result<&str, AppError> {
        Ok(self.session()?.did.as_str())
    }

    /// Explicit actor with any leading '@' removed, else the session handle
    pub fn actor_or_self(&self, actor: Option<&str>) -> Result<String, AppError> {
        match actor.map(str::trim).filter(|a| !a.is_empty()) {
            Some(actor) => {
                crate::error::validate_actor(actor)?;
                Ok(actor.strip_prefix('@').unwrap_or(actor).to_string())
            }
            None => Ok(self.session()?.handle.clone()),
        }
    }

    fn url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service, nsid)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session {
            Some(session) => request.bearer_auth(&session.access_jwt),
            None => request,
        }
    }

    /// Call an XRPC query (GET)
    pub async fn query<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &QueryParams,
    ) -> Result<T, AppError> {
        debug!(nsid, "xrpc query");
        let request = self.authorize(self.http.get(self.url(nsid)).query(params.as_slice()));
        let response = request.send().await?;
        read_json(response, nsid).await
    }

    /// Call an XRPC procedure (POST with a JSON body) and decode its output
    pub async fn procedure<B, T>(&self, nsid: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(nsid, "xrpc procedure");
        let request = self.authorize(self.http.post(self.url(nsid)).json(body));
        let response = request.send().await?;
        read_json(response, nsid).await
    }

    /// Call an XRPC procedure whose output is empty or irrelevant
    pub async fn procedure_no_output<B>(&self, nsid: &str, body: &B) -> Result<(), AppError>
    where
        B: Serialize + ?Sized,
    {
        debug!(nsid, "xrpc procedure");
        let request = self.authorize(self.http.post(self.url(nsid)).json(body));
        let response = request.send().await?;
        check_status(response, nsid).await.map(|_| ())
    }

    /// Upload raw bytes with com.atproto.repo.uploadBlob, returning the blob ref
    pub async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> Result<Value, AppError> {
        let nsid = "com.atproto.repo.uploadBlob";
        debug!(nsid, size = bytes.len(), mime_type, "uploading blob");
        let request = self.authorize(
            self.http
                .post(self.url(nsid))
                .timeout(UPLOAD_TIMEOUT)
                .header(reqwest::header::CONTENT_TYPE, mime_type)
                .body(bytes),
        );
        let response = request.send().await?;
        let mut output: Value = read_json(response, nsid).await?;
        output
            .get_mut("blob")
            .map(Value::take)
            .ok_or_else(|| AppError::ParseError("uploadBlob response has no blob".to_string()))
    }

    /// Resolve a handle to its DID; DIDs pass through untouched
    pub async fn resolve_handle(&self, handle: &str) -> Result<String, AppError> {
        let handle = handle.trim();
        let handle = handle.strip_prefix('@').unwrap_or(handle);
        crate::error::validate_actor(handle)?;
        if handle.starts_with("did:") {
            return Ok(handle.to_string());
        }

        #[derive(Deserialize)]
        struct Resolved {
            did: String,
        }

        let resolved: Resolved = self
            .query(
                "com.atproto.identity.resolveHandle",
                &QueryParams::new().with("handle", handle),
            )
            .await?;
        Ok(resolved.did)
    }

    /// Create a record in the authenticated repository
    pub async fn create_record(&self, collection: &str, record: Value) -> Result<StrongRef, AppError> {
        let body = serde_json::json!({
            "repo": self.did()?,
            "collection": collection,
            "record": record,
        });
        self.procedure("com.atproto.repo.createRecord", &body).await
    }

    /// Delete a record from the authenticated repository
    pub async fn delete_record(&self, collection: &str, rkey: &str) -> Result<(), AppError> {
        let body = serde_json::json!({
            "repo": self.did()?,
            "collection": collection,
            "rkey": rkey,
        });
        self.procedure_no_output("com.atproto.repo.deleteRecord", &body).await
    }

    pub async fn get_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> Result<RecordView, AppError> {
        let params = QueryParams::new()
            .with("repo", repo)
            .with("collection", collection)
            .with("rkey", rkey);
        self.query("com.atproto.repo.getRecord", &params).await
    }

    pub async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<ListRecordsResponse, AppError> {
        let params = QueryParams::new()
            .with("repo", repo)
            .with("collection", collection)
            .with("limit", limit)
            .with_opt("cursor", cursor);
        self.query("com.atproto.repo.listRecords", &params).await
    }

    /// Page through our own records of a collection until `matches` accepts one
    pub async fn find_own_record<F>(
        &self,
        collection: &str,
        matches: F,
    ) -> Result<Option<RecordView>, AppError>
    where
        F: Fn(&Value) -> bool,
    {
        let did = self.did()?.to_string();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_SCAN_PAGES {
            let page = self
                .list_records(&did, collection, 100, cursor.as_deref())
                .await?;
            if let Some(found) = page.records.into_iter().find(|r| matches(&r.value)) {
                return Ok(Some(found));
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(None)
    }
}

async fn check_status(response: Response, nsid: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(xrpc_error(status, &body, nsid))
}

async fn read_json<T: DeserializeOwned>(response: Response, nsid: &str) -> Result<T, AppError> {
    let response = check_status(response, nsid).await?;
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::ParseError(format!("Failed to parse {} response: {}", nsid, e)))
}

/// Human readable message from an XRPC error body
pub(crate) fn xrpc_error_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<XrpcErrorBody> = serde_json::from_str(body).ok();
    parsed
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Translate a failed XRPC response into the error taxonomy
pub(crate) fn xrpc_error(status: StatusCode, body: &str, nsid: &str) -> AppError {
    let parsed: Option<XrpcErrorBody> = serde_json::from_str(body).ok();
    let name = parsed.as_ref().and_then(|b| b.error.clone()).unwrap_or_default();
    let message = xrpc_error_message(status, body);

    let auth_error = matches!(
        name.as_str(),
        "AuthRequired" | "ExpiredToken" | "InvalidToken" | "AuthenticationRequired"
    );
    let not_found = matches!(name.as_str(), "NotFound" | "RecordNotFound" | "ProfileNotFound")
        || message.to_ascii_lowercase().contains("not found");

    if status == StatusCode::UNAUTHORIZED || auth_error {
        AppError::Authentication(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        AppError::RateLimited(format!("{}: {}", nsid, message))
    } else if status == StatusCode::NOT_FOUND || not_found {
        AppError::NotFound(message)
    } else {
        AppError::RemoteService {
            error: if name.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                name
            },
            message,
        }
    }
}
