//! Error types and handling for the Bluesky MCP server

use serde::Serialize;
use thiserror::Error;

/// Broad classes of failure surfaced to the assistant runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidArgument,
    Authentication,
    RemoteService,
    Internal,
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Remote service error: {error} - {message}")]
    RemoteService { error: String, message: String },
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the error code for MCP responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_argument",
            AppError::Authentication(_) => "authentication_error",
            AppError::NotFound(_) => "not_found",
            AppError::RateLimited(_) => "rate_limited",
            AppError::NetworkError(_) => "network_error",
            AppError::RemoteService { .. } => "remote_service_error",
            AppError::ParseError(_) => "parse_error",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::InvalidInput(_) => ErrorCategory::InvalidArgument,
            AppError::Authentication(_) => ErrorCategory::Authentication,
            AppError::NotFound(_)
            | AppError::RateLimited(_)
            | AppError::NetworkError(_)
            | AppError::RemoteService { .. }
            | AppError::ParseError(_)
            | AppError::Timeout(_) => ErrorCategory::RemoteService,
            AppError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Process exit code used by CLI mode
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidInput(_) => 1,
            AppError::Authentication(_) => 2,
            AppError::Timeout(_) => 4,
            AppError::Internal(_) => 5,
            _ => 3,
        }
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert reqwest::Error to AppError
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            AppError::NetworkError(err.to_string())
        } else if err.is_decode() {
            AppError::ParseError(err.to_string())
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

/// Convert serde_json::Error to AppError
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

/// Validate a handle or DID argument
pub fn validate_actor(actor: &str) -> Result<(), AppError> {
    let actor = actor.strip_prefix('@').unwrap_or(actor);
    if actor.is_empty() {
        return Err(AppError::InvalidInput("Handle cannot be empty".to_string()));
    }

    if let Some(rest) = actor.strip_prefix("did:") {
        // did:<method>:<identifier>
        let mut parts = rest.splitn(2, ':');
        let method = parts.next().unwrap_or_default();
        let ident = parts.next().unwrap_or_default();
        if method.is_empty() || ident.is_empty() {
            return Err(AppError::InvalidInput(format!("Invalid DID format: {}", actor)));
        }
        return Ok(());
    }

    if !actor.contains('.') {
        return Err(AppError::InvalidInput(format!(
            "Invalid handle format, must contain domain: {}",
            actor
        )));
    }

    if actor.split('.').any(|part| part.is_empty()) {
        return Err(AppError::InvalidInput(format!("Invalid handle format: {}", actor)));
    }

    Ok(())
}

pub fn validate_query(query: &str) -> Result<(), AppError> {
    if query.trim().is_empty() {
        return Err(AppError::InvalidInput("Query cannot be empty".to_string()));
    }

    Ok(())
}
