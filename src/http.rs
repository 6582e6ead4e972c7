//! HTTP client utilities
//!
//! Builds the reqwest::Client used for every XRPC call, with a request timeout
//! and the usual proxy environment variables honoured

use reqwest::{Client, Proxy};
use std::time::Duration;
use url::Url;

/// Default per-request timeout for XRPC queries and procedures
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for blob uploads
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Build a reqwest Client with the given timeout and honoring proxy env vars
///
/// Recognized env vars:
/// - HTTP_PROXY / http_proxy
/// - HTTPS_PROXY / https_proxy
/// - ALL_PROXY / all_proxy
/// - NO_PROXY / no_proxy
pub fn client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10));

    let all_proxy = getenv_first(&["ALL_PROXY", "all_proxy"]);
    let https_proxy = getenv_first(&["HTTPS_PROXY", "https_proxy"]).or_else(|| all_proxy.clone());
    let http_proxy = getenv_first(&["HTTP_PROXY", "http_proxy"]).or(all_proxy);
    let no_proxy_rules = parse_no_proxy(&getenv_first(&["NO_PROXY", "no_proxy"]).unwrap_or_default());

    if https_proxy.is_some() || http_proxy.is_some() {
        let proxy = Proxy::custom(move |url: &Url| {
            let host = url.host_str().unwrap_or("");
            if should_bypass_proxy(host, &no_proxy_rules) {
                return None;
            }
            match url.scheme() {
                "https" => https_proxy.clone().or_else(|| http_proxy.clone()),
                "http" => http_proxy.clone().or_else(|| https_proxy.clone()),
                _ => None,
            }
        });
        builder = builder.proxy(proxy);
    }

    builder
        .user_agent(concat!("bluesky-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn getenv_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq)]
enum NoProxyRule {
    Wildcard,
    Domain(String), // matches suffix
    Exact(String),
}

fn parse_no_proxy(val: &str) -> Vec<NoProxyRule> {
    val.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|token| {
            if token == "*" {
                return NoProxyRule::Wildcard;
            }
            if let Some(domain) = token.strip_prefix('.') {
                return NoProxyRule::Domain(domain.to_ascii_lowercase());
            }

            let t = token.to_ascii_lowercase();
            if t == "localhost" || t.parse::<std::net::IpAddr>().is_ok() {
                NoProxyRule::Exact(t)
            } else {
                NoProxyRule::Domain(t)
            }
        })
        .collect()
}

fn should_bypass_proxy(host: &str, rules: &[NoProxyRule]) -> bool {
    if host.is_empty() {
        return false;
    }
    let host_lc = host.to_ascii_lowercase();
    rules.iter().any(|r| match r {
        NoProxyRule::Wildcard => true,
        NoProxyRule::Exact(ex) => host_lc == *ex,
        NoProxyRule::Domain(suf) => host_lc == *suf || host_lc.ends_with(&format!(".{}", suf)),
    })
}
