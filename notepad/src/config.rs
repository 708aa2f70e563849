use std::time::Duration;

use crate::actors::draft::DEFAULT_AUTOSAVE_DELAY;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the notes REST API (no trailing slash)
    pub api_url: String,
    /// Quiet period before a dirty draft is autosaved
    pub autosave_delay: Duration,
    /// Per-request timeout for remote calls
    pub request_timeout: Duration,
    /// Session cookie value forwarded as `sessionid`
    pub session_id: Option<String>,
    /// CSRF token forwarded on mutating requests
    pub csrf_token: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api_url: env_str("NOTES_API_URL", "http://localhost:8000")
                .trim_end_matches('/')
                .to_string(),
            autosave_delay: Duration::from_millis(env_parse(
                "NOTES_AUTOSAVE_DEBOUNCE_MS",
                DEFAULT_AUTOSAVE_DELAY.as_millis() as u64,
            )?),
            request_timeout: Duration::from_secs(env_parse("NOTES_REQUEST_TIMEOUT_SECS", 15)?),
            session_id: env_opt("NOTES_SESSION_ID"),
            csrf_token: env_opt("NOTES_CSRF_TOKEN"),
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => parse_value(key, &val),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, val: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}"))
}
