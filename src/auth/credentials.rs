//! Credentials for app password authentication

use serde::Serialize;

/// User credentials for BlueSky authentication
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Account identifier (handle, DID or email)
    pub identifier: String,

    /// App password
    #[serde(skip_serializing)]
    pub password: String,

    /// Service URL (defaults to https://bsky.social)
    #[serde(skip_serializing)]
    pub service: String,
}

impl Credentials {
    /// Create credentials with custom service URL
    pub fn with_service(
        identifier: impl Into<String>,
        password: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        let identifier: String = identifier.into();
        Self {
            identifier: identifier.strip_prefix('@').unwrap_or(&identifier).to_string(),
            password: password.into(),
            service: service.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
