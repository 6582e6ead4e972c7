//! Session management for authenticated BlueSky sessions

use crate::auth::Credentials;
use crate::bluesky::client::{xrpc_error, xrpc_error_message};
use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session data from com.atproto.server.createSession
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    /// Access JWT token
    pub access_jwt: String,

    /// Refresh JWT token
    pub refresh_jwt: String,

    /// User's handle
    pub handle: String,

    /// User's DID
    pub did: String,

    /// Service URL
    pub service: String,

    /// Token expiration time (calculated from creation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Check if the access token is expired or will expire soon (within 5 minutes)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at - Duration::minutes(5),
            None => false,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("did", &self.did)
            .field("service", &self.service)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Response from com.atproto.server.createSession and refreshSession
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    access_jwt: String,
    refresh_jwt: String,
    handle: String,
    did: String,
}

/// Performs the session XRPC calls against the PDS
#[derive(Clone)]
pub struct SessionManager {
    client: reqwest::Client,
}

impl SessionManager {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Authenticate using app password and create a new session
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AppError> {
        let nsid = "com.atproto.server.createSession";
        let url = format!("{}/xrpc/{}", credentials.service.trim_end_matches('/'), nsid);

        let body = serde_json::json!({
            "identifier": credentials.identifier,
            "password": credentials.password,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Login request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(login_error(status, &error_text, nsid));
        }

        let session_response: SessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Failed to parse session response: {}", e)))?;

        debug!(did = %session_response.did, handle = %session_response.handle, "created session");
        Ok(into_session(session_response, &credentials.service))
    }

    /// Refresh an existing session using the refresh token
    pub async fn refresh(&self, session: &Session) -> Result<Session, AppError> {
        let nsid = "com.atproto.server.refreshSession";
        let url = format!("{}/xrpc/{}", session.service, nsid);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", session.refresh_jwt))
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Refresh request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(login_error(status, &error_text, nsid));
        }

        let refresh_response: SessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Failed to parse refresh response: {}", e)))?;

        debug!(did = %refresh_response.did, "refreshed session");
        Ok(into_session(refresh_response, &session.service))
    }
}

fn into_session(response: SessionResponse, service: &str) -> Session {
    Session {
        access_jwt: response.access_jwt,
        refresh_jwt: response.refresh_jwt,
        handle: response.handle,
        did: response.did,
        service: service.trim_end_matches('/').to_string(),
        // Access tokens live for two hours
        expires_at: Some(Utc::now() + Duration::hours(2)),
    }
}

/// Client errors on the session endpoints mean the credentials were rejected
fn login_error(status: reqwest::StatusCode, body: &str, nsid: &str) -> AppError {
    if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
        AppError::Authentication(xrpc_error_message(status, body))
    } else {
        xrpc_error(status, body, nsid)
    }
}
