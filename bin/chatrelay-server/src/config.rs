//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use chatrelay_core::UpstreamConfig;

/// Secret used when `CHATRELAY_JWT_SECRET` is unset. Tokens signed with it are
/// only good for local development; startup warns when it is in effect.
pub const DEFAULT_JWT_SECRET: &str = "default_jwt_secret";

/// Lifetime of tokens issued at login and registration.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Runtime configuration for chatrelay-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// sqlx SQLite connection string (default: `"sqlite://chatrelay.db?mode=rwc"`).
    pub database_url: String,

    /// Backend chat endpoint (default: `"http://localhost:11434/api/chat"`).
    pub upstream_url: String,

    /// Whole-request timeout for upstream calls, in seconds.
    pub upstream_timeout_secs: u64,

    /// HS256 secret for bearer-token verification.
    pub jwt_secret: String,

    /// Seconds an issued token stays valid.
    pub token_ttl_secs: i64,

    /// bcrypt work factor for stored passwords.
    pub bcrypt_cost: u32,

    /// Comma-separated list of allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CHATRELAY_BIND", "0.0.0.0:8080"),
            database_url: env_or("CHATRELAY_DATABASE_URL", "sqlite://chatrelay.db?mode=rwc"),
            upstream_url: env_or("CHATRELAY_UPSTREAM_URL", UpstreamConfig::DEFAULT_CHAT_URL),
            upstream_timeout_secs: parse_env(
                "CHATRELAY_UPSTREAM_TIMEOUT_SECS",
                UpstreamConfig::DEFAULT_TIMEOUT.as_secs(),
            ),
            jwt_secret: env_or("CHATRELAY_JWT_SECRET", DEFAULT_JWT_SECRET),
            token_ttl_secs: parse_env("CHATRELAY_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS),
            bcrypt_cost: parse_env("CHATRELAY_BCRYPT_COST", bcrypt::DEFAULT_COST),
            cors_allowed_origins: std::env::var("CHATRELAY_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            log_level: env_or("CHATRELAY_LOG", "info"),
            log_json: env_flag("CHATRELAY_LOG_JSON", false),
            enable_docs: env_flag("CHATRELAY_ENABLE_DOCS", true),
        }
    }

    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig::from_chat_url(
            self.upstream_url.clone(),
            Duration::from_secs(self.upstream_timeout_secs),
        )
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".into(),
            database_url: "sqlite://chatrelay.db?mode=rwc".into(),
            upstream_url: UpstreamConfig::DEFAULT_CHAT_URL.into(),
            upstream_timeout_secs: UpstreamConfig::DEFAULT_TIMEOUT.as_secs(),
            jwt_secret: DEFAULT_JWT_SECRET.into(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_allowed_origins: None,
            log_level: "info".into(),
            log_json: false,
            enable_docs: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn upstream_config_derives_models_url() {
        let cfg = Config {
            upstream_url: "http://gpu-box:11434/api/chat".into(),
            upstream_timeout_secs: 7,
            ..Config::default()
        };
        let upstream = cfg.upstream();
        assert_eq!(upstream.models_url, "http://gpu-box:11434/api/tags");
        assert_eq!(upstream.timeout, Duration::from_secs(7));
    }

    #[test]
    fn default_secret_is_detected() {
        assert!(Config::default().uses_default_jwt_secret());
        let cfg = Config {
            jwt_secret: "s3cret".into(),
            ..Config::default()
        };
        assert!(!cfg.uses_default_jwt_secret());
    }
}
