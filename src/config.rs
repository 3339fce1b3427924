//! Configuration management

use anyhow::{Context, Result};

use crate::defaults::{DEFAULT_BACKEND_TIMEOUT_SECONDS, DEFAULT_STOP_CEILING};
use crate::services::auto_match::{GeoScore, MatchConfig};
use crate::services::backend::BackendConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// Backend base URL (optional, falls back to the in-memory mock if unset)
    pub backend_url: Option<String>,

    /// Bearer token sent to the backend
    pub backend_token: Option<String>,

    pub backend_timeout_seconds: u64,

    /// Stop count treated as a full route by the auto-match scorer
    pub match_stop_ceiling: u32,

    /// Geographic sub-score: `fixed` (default) or `proximity`
    pub match_geo: GeoScore,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let backend_timeout_seconds = parse_var("BACKEND_TIMEOUT_SECONDS", DEFAULT_BACKEND_TIMEOUT_SECONDS)?;
        let match_stop_ceiling = parse_var("MATCH_STOP_CEILING", DEFAULT_STOP_CEILING)?;
        if match_stop_ceiling == 0 {
            anyhow::bail!("MATCH_STOP_CEILING must be at least 1");
        }
        let match_geo = match non_empty_var("MATCH_GEO_MODE") {
            Some(raw) => parse_geo_mode(&raw)?,
            None => GeoScore::default(),
        };

        Ok(Self {
            nats_url,
            nats_user: non_empty_var("NATS_USER"),
            nats_password: non_empty_var("NATS_PASSWORD"),
            backend_url: non_empty_var("BACKEND_URL"),
            backend_token: non_empty_var("BACKEND_TOKEN"),
            backend_timeout_seconds,
            match_stop_ceiling,
            match_geo,
        })
    }

    /// Backend client settings, `None` when no backend is configured
    pub fn backend(&self) -> Option<BackendConfig> {
        self.backend_url.as_ref().map(|url| BackendConfig {
            token: self.backend_token.clone(),
            timeout_seconds: self.backend_timeout_seconds,
            ..BackendConfig::new(url.as_str())
        })
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            stop_ceiling: self.match_stop_ceiling,
            geo: self.match_geo,
            ..MatchConfig::default()
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_geo_mode(raw: &str) -> Result<GeoScore> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "fixed" => Ok(GeoScore::default()),
        "proximity" => Ok(GeoScore::proximity()),
        other => anyhow::bail!("MATCH_GEO_MODE must be 'fixed' or 'proximity', got '{}'", other),
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_backend_none_when_not_set() {
        std::env::remove_var("BACKEND_URL");

        let config = Config::from_env().unwrap();
        assert!(config.backend().is_none());
        assert_eq!(config.match_stop_ceiling, 20);
    }

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        std::env::remove_var("KIDROUTE_TEST_UNSET_NUMBER");
        assert_eq!(parse_var("KIDROUTE_TEST_UNSET_NUMBER", 7u32).unwrap(), 7);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        std::env::set_var("KIDROUTE_TEST_BAD_NUMBER", "twenty");
        let err = parse_var::<u32>("KIDROUTE_TEST_BAD_NUMBER", 20).unwrap_err();
        assert!(err.to_string().contains("KIDROUTE_TEST_BAD_NUMBER"));
        std::env::remove_var("KIDROUTE_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_backend_config_from_fields() {
        let config = Config {
            nats_url: "nats://localhost:4222".to_string(),
            nats_user: None,
            nats_password: None,
            backend_url: Some("http://backend:8080/api/".to_string()),
            backend_token: Some("secret".to_string()),
            backend_timeout_seconds: 5,
            match_stop_ceiling: 12,
            match_geo: GeoScore::proximity(),
        };

        let backend = config.backend().unwrap();
        assert_eq!(backend.base_url, "http://backend:8080/api");
        assert_eq!(backend.token.as_deref(), Some("secret"));
        assert_eq!(backend.timeout_seconds, 5);
        assert_eq!(config.match_config().stop_ceiling, 12);
        assert_eq!(config.match_config().geo, GeoScore::proximity());
    }

    #[test]
    fn test_geo_mode_parses() {
        assert_eq!(parse_geo_mode("fixed").unwrap(), GeoScore::default());
        assert_eq!(parse_geo_mode(" Proximity ").unwrap(), GeoScore::proximity());
        let err = parse_geo_mode("nearby").unwrap_err();
        assert!(err.to_string().contains("MATCH_GEO_MODE"));
    }
}
