use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every remote endpoint the service talks to is resolved from here.
#[derive(Debug, Clone)]
pub struct Config {
    pub session_api_url: String,
    pub webhook_base_url: String,
    pub poll_base_url: String,
    /// Per-agent URL overrides keyed by env var name, e.g. `AGENT_SEO_KEYWORDS_POLL_URL`.
    pub endpoint_overrides: HashMap<String, String>,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub http_timeout: Duration,
    pub notification_ttl: Duration,
    pub login_path: String,
    pub port: u16,
    pub rust_log: String,
}

/// The pair of URLs one agent is driven through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEndpoints {
    pub webhook_url: String,
    pub poll_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let endpoint_overrides = std::env::vars()
            .filter(|(key, _)| {
                key.starts_with("AGENT_")
                    && (key.ends_with("_WEBHOOK_URL") || key.ends_with("_POLL_URL"))
                    && key != "AGENT_WEBHOOK_BASE_URL"
                    && key != "AGENT_POLL_BASE_URL"
            })
            .collect();

        Ok(Config {
            session_api_url: trim_base(require_env("SESSION_API_URL")?),
            webhook_base_url: trim_base(require_env("AGENT_WEBHOOK_BASE_URL")?),
            poll_base_url: trim_base(require_env("AGENT_POLL_BASE_URL")?),
            endpoint_overrides,
            poll_interval: Duration::from_secs(parse_env("POLL_INTERVAL_SECS", 20)?),
            poll_max_attempts: parse_env("POLL_MAX_ATTEMPTS", 15)?,
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30)?),
            notification_ttl: Duration::from_secs(parse_env("NOTIFICATION_TTL_SECS", 4)?),
            login_path: std::env::var("LOGIN_PATH").unwrap_or_else(|_| "/login".to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Resolves the webhook and poll URLs for an agent: an explicit override
    /// wins, otherwise `{base}/{slug}`.
    pub fn endpoints_for(&self, slug: &str) -> AgentEndpoints {
        let lookup = |kind: &str, base: &str| {
            self.endpoint_overrides
                .get(&override_key(slug, kind))
                .cloned()
                .unwrap_or_else(|| format!("{base}/{slug}"))
        };

        AgentEndpoints {
            webhook_url: lookup("WEBHOOK", &self.webhook_base_url),
            poll_url: lookup("POLL", &self.poll_base_url),
        }
    }
}

/// `seo-keywords` + `POLL` → `AGENT_SEO_KEYWORDS_POLL_URL`
pub fn override_key(slug: &str, kind: &str) -> String {
    format!(
        "AGENT_{}_{}_URL",
        slug.to_ascii_uppercase().replace('-', "_"),
        kind
    )
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            session_api_url: "http://session.test".to_string(),
            webhook_base_url: "http://hooks.test/webhook".to_string(),
            poll_base_url: "http://hooks.test/results".to_string(),
            endpoint_overrides: HashMap::new(),
            poll_interval: Duration::from_secs(20),
            poll_max_attempts: 15,
            http_timeout: Duration::from_secs(30),
            notification_ttl: Duration::from_secs(4),
            login_path: "/login".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_key_upper_snake() {
        assert_eq!(
            override_key("seo-keywords", "POLL"),
            "AGENT_SEO_KEYWORDS_POLL_URL"
        );
        assert_eq!(
            override_key("blog-writer", "WEBHOOK"),
            "AGENT_BLOG_WRITER_WEBHOOK_URL"
        );
    }

    #[test]
    fn test_endpoints_default_to_base_and_slug() {
        let config = Config::for_tests();
        let endpoints = config.endpoints_for("email-campaign");
        assert_eq!(endpoints.webhook_url, "http://hooks.test/webhook/email-campaign");
        assert_eq!(endpoints.poll_url, "http://hooks.test/results/email-campaign");
    }

    #[test]
    fn test_endpoint_override_wins() {
        let mut config = Config::for_tests();
        config.endpoint_overrides.insert(
            "AGENT_AD_GENERATOR_POLL_URL".to_string(),
            "http://other.test/ads/latest".to_string(),
        );
        let endpoints = config.endpoints_for("ad-generator");
        assert_eq!(endpoints.poll_url, "http://other.test/ads/latest");
        assert_eq!(endpoints.webhook_url, "http://hooks.test/webhook/ad-generator");
    }

    #[test]
    fn test_trim_base_strips_trailing_slashes() {
        assert_eq!(trim_base("http://a.test/x//".to_string()), "http://a.test/x");
    }
}
