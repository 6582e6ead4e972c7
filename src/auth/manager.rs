use super::config::{APP_PASSWORD_VAR, IDENTIFIER_VAR};
use super::{Config, Session, SessionManager};
use crate::error::AppError;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Where the process-wide session currently stands
#[derive(Debug, Clone)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(Session),
    Failed(String),
}

/// Snapshot reported by the status tool
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// AuthManager owns the single lazily established session for this process
pub struct AuthManager {
    config: Config,
    sessions: SessionManager,
    state: Mutex<AuthState>,
}

impl AuthManager {
    pub fn new(config: Config, client: reqwest::Client) -> Self {
        Self {
            config,
            sessions: SessionManager::new(client),
            state: Mutex::new(AuthState::Unauthenticated),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Return a usable session, logging in on first use
    ///
    /// A cached session is reused until it nears expiry, at which point it is
    /// refreshed. Each call makes at most one login attempt.
    pub async fn ensure_authenticated(&self) -> Result<Session, AppError> {
        let mut state = self.state.lock().await;

        if let AuthState::Authenticated(session) = &*state {
            if !session.is_expired() {
                return Ok(session.clone());
            }
            match self.sessions.refresh(session).await {
                Ok(refreshed) => {
                    *state = AuthState::Authenticated(refreshed.clone());
                    return Ok(refreshed);
                }
                Err(e) => warn!("Session refresh failed, logging in again: {}", e),
            }
        }

        // Missing configuration is not a failed attempt, status keeps saying so
        let credentials = self.config.credentials()?;

        info!("Authenticating as {} against {}", credentials.identifier, credentials.service);
        match self.sessions.login(&credentials).await {
            Ok(session) => {
                info!("Authenticated as @{} ({})", session.handle, session.did);
                *state = AuthState::Authenticated(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!("Authentication failed: {}", e);
                *state = AuthState::Failed(e.message());
                Err(e)
            }
        }
    }

    /// Unexpired session if one is already established, without logging in
    pub async fn current_session(&self) -> Option<Session> {
        match &*self.state.lock().await {
            AuthState::Authenticated(session) if !session.is_expired() => Some(session.clone()),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) async fn is_authenticated(&self) -> bool {
        self.current_session().await.is_some()
    }

    #[cfg(test)]
    pub(crate) async fn install_session(&self, session: Session) {
        *self.state.lock().await = AuthState::Authenticated(session);
    }

    /// Drop a session the remote service no longer accepts
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if let AuthState::Authenticated(session) = &*state {
            warn!("Invalidating session for @{}", session.handle);
            *state = AuthState::Unauthenticated;
        }
    }

    #[cfg(test)]
    pub(crate) async fn state(&self) -> AuthState {
        self.state.lock().await.clone()
    }

    pub async fn status(&self) -> AuthStatus {
        match &*self.state.lock().await {
            AuthState::Authenticated(session) => AuthStatus {
                status: "authenticated",
                handle: Some(session.handle.clone()),
                did: Some(session.did.clone()),
                message: None,
            },
            AuthState::Failed(reason) => AuthStatus {
                status: "not_authenticated",
                handle: None,
                did: None,
                message: Some(format!("Last authentication attempt failed: {}", reason)),
            },
            AuthState::Unauthenticated if self.config.has_credentials() => AuthStatus {
                status: "not_authenticated",
                handle: None,
                did: None,
                message: Some(format!(
                    "Environment variables are set but authentication hasn't happened yet. Will connect to {} when you use any tool.",
                    self.config.service()
                )),
            },
            AuthState::Unauthenticated => AuthStatus {
                status: "not_authenticated",
                handle: None,
                did: None,
                message: Some(format!(
                    "Required environment variables {} and/or {} are not set.",
                    IDENTIFIER_VAR, APP_PASSWORD_VAR
                )),
            },
        }
    }
}
