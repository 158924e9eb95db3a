use serde::Deserialize;
use std::env;

use crate::rate::{RateLimitSpec, RouteKey};

pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000,http://127.0.0.1:5173";
pub const DEFAULT_ROUTE_OPTIONS_RATE_LIMIT: RateLimitSpec = RateLimitSpec::per_minute(10);
pub const DEFAULT_CHAT_RATE_LIMIT: RateLimitSpec = RateLimitSpec::per_minute(20);

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub cors: CorsSection,
    pub rate_limit: RateLimitSection,
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub env: String,
    pub name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSection {
    /// Comma-separated list of allowed origins.
    pub origins: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSection {
    pub enabled: bool,
    pub route_options: RateLimitSpec,
    pub chat: RateLimitSpec,
    /// Expired windows are pruned once the limiter tracks more keys than this.
    pub max_tracked_clients: usize,
}

impl RateLimitSection {
    pub fn spec_for(&self, route: RouteKey) -> RateLimitSpec {
        match route {
            RouteKey::Chat => self.chat,
            RouteKey::RouteOptions => self.route_options,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    pub max_request_size_bytes: usize,
    pub concurrency_limit: usize,
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment. Each variable is
    /// looked up as `CHAT_RATE_LIMIT`, then as `chat_rate_limit`.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).or_else(|_| env::var(key.to_ascii_lowercase())).ok())
    }

    /// Builds the config from an arbitrary variable lookup, falling back to defaults.
    /// Values that don't parse into their field types are an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let builder = config::Config::builder()
            .set_default("app.env", var("APP_ENV", "local"))?
            .set_default("app.name", var("APP_NAME", "iotinerary-api"))?
            .set_default("app.host", var("APP_HOST", "0.0.0.0"))?
            .set_default("app.port", var("APP_PORT", "8000"))?
            .set_default("logging.log_format", var("LOG_FORMAT", "text"))?
            .set_default("cors.origins", var("CORS_ORIGINS", DEFAULT_CORS_ORIGINS))?
            .set_default("rate_limit.enabled", var("RATE_LIMIT_ENABLED", "true"))?
            .set_default(
                "rate_limit.route_options",
                var("ROUTE_OPTIONS_RATE_LIMIT", &DEFAULT_ROUTE_OPTIONS_RATE_LIMIT.to_string()),
            )?
            .set_default("rate_limit.chat", var("CHAT_RATE_LIMIT", &DEFAULT_CHAT_RATE_LIMIT.to_string()))?
            .set_default("rate_limit.max_tracked_clients", var("RATE_LIMIT_MAX_TRACKED_CLIENTS", "10000"))?
            .set_default("http.max_request_size_bytes", var("MAX_REQUEST_SIZE_BYTES", "65536"))?
            .set_default("http.concurrency_limit", var("CONCURRENCY_LIMIT", "1024"))?;

        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn is_production(&self) -> bool { self.app.env == "production" }

    /// Allowed origins in configured order, trimmed, empty items dropped.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors
            .origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection {
                env: "local".into(),
                name: "iotinerary-api".into(),
                host: "0.0.0.0".into(),
                port: 8000,
            },
            logging: LoggingSection { log_format: "text".into() },
            cors: CorsSection { origins: DEFAULT_CORS_ORIGINS.into() },
            rate_limit: RateLimitSection {
                enabled: true,
                route_options: DEFAULT_ROUTE_OPTIONS_RATE_LIMIT,
                chat: DEFAULT_CHAT_RATE_LIMIT,
                max_tracked_clients: 10_000,
            },
            http: HttpSection { max_request_size_bytes: 65_536, concurrency_limit: 1024 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = load_with(&[]).unwrap();
        assert!(cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.route_options, RateLimitSpec::per_minute(10));
        assert_eq!(cfg.rate_limit.chat, RateLimitSpec::per_minute(20));
        assert_eq!(cfg.app.port, 8000);
        assert_eq!(
            cfg.cors_origins_list(),
            vec!["http://localhost:5173", "http://localhost:3000", "http://127.0.0.1:5173"]
        );
    }

    #[test]
    fn test_overrides_from_lookup() {
        let cfg = load_with(&[
            ("RATE_LIMIT_ENABLED", "false"),
            ("CHAT_RATE_LIMIT", "2/minute"),
            ("ROUTE_OPTIONS_RATE_LIMIT", "5 per second"),
            ("APP_PORT", "9001"),
        ])
        .unwrap();
        assert!(!cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.spec_for(RouteKey::Chat), RateLimitSpec::per_minute(2));
        assert_eq!(cfg.rate_limit.spec_for(RouteKey::RouteOptions).max_requests, 5);
        assert_eq!(cfg.app.port, 9001);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        assert!(load_with(&[("RATE_LIMIT_ENABLED", "maybe")]).is_err());
        assert!(load_with(&[("CHAT_RATE_LIMIT", "lots")]).is_err());
        assert!(load_with(&[("APP_PORT", "eighty")]).is_err());
    }

    #[test]
    fn test_cors_origins_list_trims_and_keeps_order() {
        let mut cfg = AppConfig::default();
        cfg.cors.origins = " https://b.example , https://a.example,,".into();
        assert_eq!(cfg.cors_origins_list(), vec!["https://b.example", "https://a.example"]);
    }
}
