//! Environment and authentication status tools

use super::args::NoArgs;
use super::{ToolContext, ToolMeta, ToolRegistry};
use crate::auth::config::{APP_PASSWORD_VAR, IDENTIFIER_VAR, SERVICE_URL_VAR};
use crate::auth::DEFAULT_SERVICE;
use crate::error::AppError;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolMeta::public(
            "check_environment_variables",
            "authentication",
            "Check whether the Bluesky credential environment variables are set",
        ),
        check_environment_variables,
    );
    registry.register(
        ToolMeta::public(
            "check_auth_status",
            "authentication",
            "Check if the server is authenticated with Bluesky, without logging in",
        ),
        check_auth_status,
    );
}

/// Report which credential variables are configured, never their secret values
pub async fn check_environment_variables(
    ctx: Arc<ToolContext>,
    _args: NoArgs,
) -> Result<Value, AppError> {
    let config = ctx.auth.config();

    let set = |present: bool| if present { "set" } else { "not set" };
    let service = match &config.service_url {
        Some(url) => format!("set to {}", url),
        None => format!("not set (will default to {})", DEFAULT_SERVICE),
    };

    let variables = json!({
        IDENTIFIER_VAR: set(config.identifier.is_some()),
        APP_PASSWORD_VAR: set(config.app_password.is_some()),
        SERVICE_URL_VAR: service,
    });

    Ok(if config.has_credentials() {
        json!({
            "status": "success",
            "message": "Required environment variables are correctly set",
            "variables": variables,
        })
    } else {
        json!({
            "status": "incomplete",
            "message": "Missing required environment variables",
            "variables": variables,
        })
    })
}

pub async fn check_auth_status(ctx: Arc<ToolContext>, _args: NoArgs) -> Result<Value, AppError> {
    Ok(serde_json::to_value(ctx.auth.status().await)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Config;

    fn context(config: Config) -> Arc<ToolContext> {
        Arc::new(ToolContext::new(config, reqwest::Client::new()))
    }

    #[tokio::test]
    async fn test_environment_variables_reported() {
        let ctx = context(Config::new(
            Some("alice.bsky.social".into()),
            Some("secret".into()),
            None,
        ));
        let out = check_environment_variables(ctx, NoArgs {}).await.unwrap();
        assert_eq!(out["status"], "success");
        assert_eq!(out["variables"]["BLUESKY_IDENTIFIER"], "set");
        assert!(out["variables"]["BLUESKY_SERVICE_URL"]
            .as_str()
            .unwrap()
            .contains("https://bsky.social"));
        assert!(!out.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_environment_variables_missing() {
        let out = check_environment_variables(context(Config::default()), NoArgs {})
            .await
            .unwrap();
        assert_eq!(out["status"], "incomplete");
        assert_eq!(out["variables"]["BLUESKY_APP_PASSWORD"], "not set");
    }

    #[tokio::test]
    async fn test_auth_status_before_login() {
        let ctx = context(Config::new(
            Some("alice.bsky.social".into()),
            Some("secret".into()),
            Some("https://pds.example".into()),
        ));
        let out = check_auth_status(ctx, NoArgs {}).await.unwrap();
        assert_eq!(out["status"], "not_authenticated");
        assert!(out["message"].as_str().unwrap().contains("https://pds.example"));
    }
}
