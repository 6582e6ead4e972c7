//! Environment configuration for the Bluesky account

use super::{Credentials, DEFAULT_SERVICE};
use crate::error::AppError;
use std::fmt;

pub const IDENTIFIER_VAR: &str = "BLUESKY_IDENTIFIER";
pub const APP_PASSWORD_VAR: &str = "BLUESKY_APP_PASSWORD";
pub const SERVICE_URL_VAR: &str = "BLUESKY_SERVICE_URL";

/// Account configuration, usually sourced from the process environment
#[derive(Clone, Default)]
pub struct Config {
    pub identifier: Option<String>,
    pub app_password: Option<String>,
    pub service_url: Option<String>,
}

impl Config {
    pub fn new(
        identifier: Option<String>,
        app_password: Option<String>,
        service_url: Option<String>,
    ) -> Self {
        Self {
            identifier: non_empty(identifier),
            app_password: non_empty(app_password),
            service_url: non_empty(service_url),
        }
    }

    /// Read configuration through a lookup keyed by environment variable name
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(
            lookup(IDENTIFIER_VAR),
            lookup(APP_PASSWORD_VAR),
            lookup(SERVICE_URL_VAR),
        )
    }

    /// Service URL, falling back to the default PDS
    pub fn service(&self) -> &str {
        self.service_url
            .as_deref()
            .unwrap_or(DEFAULT_SERVICE)
            .trim_end_matches('/')
    }

    pub fn has_credentials(&self) -> bool {
        self.identifier.is_some() && self.app_password.is_some()
    }

    /// Build login credentials, failing when either required variable is missing
    pub fn credentials(&self) -> Result<Credentials, AppError> {
        match (&self.identifier, &self.app_password) {
            (Some(identifier), Some(password)) => Ok(Credentials::with_service(
                identifier.as_str(),
                password.as_str(),
                self.service(),
            )),
            _ => Err(AppError::Authentication(format!(
                "{} and/or {} environment variables not set",
                IDENTIFIER_VAR, APP_PASSWORD_VAR
            ))),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("identifier", &self.identifier)
            .field("app_password", &self.app_password.as_ref().map(|_| "<redacted>"))
            .field("service_url", &self.service_url)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
