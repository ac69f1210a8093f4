//! # Configuration
//!
//! Plain environment-variable configuration, in the style the rest of the
//! corpus uses for connection strings and service settings (no dedicated
//! config-layer crate).

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

/// The resolver's runtime role. Only the leader mutates durable state;
/// readers serve query traffic against whatever the leader has already
/// written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Drives the polling loop and owns all writes.
    Leader,
    /// Read-only: serves queries, never polls or writes.
    Reader,
}

/// Resolver configuration, assembled from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// Durable store connection string.
    pub database_url: String,

    /// Object-cache connection string.
    pub cache_url: String,

    /// Indexer HTTP base URL (the websocket push channel is derived from
    /// this by swapping the scheme for `ws`/`wss`).
    pub indexer_base_url: String,

    /// Ecosystem DIDs the VS-requirement evaluator will consider;
    /// ecosystems outside this set are dropped from the requirement
    /// grouping.
    pub allowed_ecosystem_dids: Vec<String>,

    /// This instance's role.
    pub role: Role,

    /// Poll interval, when no push notification arrives first.
    pub poll_interval: Duration,

    /// Object-cache entry TTL.
    pub object_cache_ttl: Duration,

    /// `TrustResult` TTL.
    pub trust_ttl: Duration,

    /// Fraction of `trust_ttl` within which a result is eligible for
    /// proactive refresh.
    pub ttl_refresh_ratio: f64,

    /// Days a reattemptable resource is retried before being expired.
    pub reattempt_retention_days: i64,

    /// Listen port for the (out-of-scope) query API, carried here only so
    /// one `Config` suffices for the whole process.
    pub listen_port: u16,

    /// `tracing` log filter directive, e.g. `"info"` or
    /// `"resolver=debug,info"`.
    pub log_level: String,

    /// Disables the digest-SRI check in the credential evaluator —
    /// intended for environments without schema content hosting.
    pub disable_digest_sri: bool,

    /// The four reference ECS digests, hex- or SRI-encoded as configured.
    pub ecs_digests: EcsDigests,
}

/// The four reference digests used to classify a schema's ECS type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EcsDigests {
    /// Digest identifying an `ECS-SERVICE` schema.
    pub service: String,
    /// Digest identifying an `ECS-ORG` schema.
    pub org: String,
    /// Digest identifying an `ECS-PERSONA` schema.
    pub persona: String,
    /// Digest identifying an `ECS-UA` schema.
    pub user_agent: String,
}

impl Config {
    /// Loads configuration from the environment, applying defaults where a
    /// variable is unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing, or a
    /// variable with a numeric/enum shape fails to parse.
    pub fn from_env() -> Result<Self> {
        let role = match env::var("RESOLVER_ROLE").as_deref() {
            Ok("leader") => Role::Leader,
            Ok("reader") => Role::Reader,
            Ok(other) => {
                return Err(Error::Config(format!("RESOLVER_ROLE must be leader|reader, got {other}")));
            }
            Err(_) => return Err(Error::Config("RESOLVER_ROLE is required".into())),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            cache_url: required("CACHE_URL")?,
            indexer_base_url: required("INDEXER_BASE_URL")?,
            allowed_ecosystem_dids: required("ALLOWED_ECOSYSTEM_DIDS")?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            role,
            poll_interval: duration_secs("POLL_INTERVAL_SECONDS", 5)?,
            object_cache_ttl: duration_secs("OBJECT_CACHE_TTL_SECONDS", 86_400)?,
            trust_ttl: duration_secs("TRUST_TTL_SECONDS", 3_600)?,
            ttl_refresh_ratio: float_env("TTL_REFRESH_RATIO", 0.2)?,
            reattempt_retention_days: int_env("REATTEMPT_RETENTION_DAYS", 7)?,
            listen_port: int_env("LISTEN_PORT", 8080)?
                .try_into()
                .map_err(|_| Error::Config("LISTEN_PORT out of range".into()))?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            disable_digest_sri: bool_env("DISABLE_DIGEST_SRI", false),
            ecs_digests: EcsDigests {
                service: env::var("ECS_DIGEST_SERVICE").unwrap_or_default(),
                org: env::var("ECS_DIGEST_ORG").unwrap_or_default(),
                persona: env::var("ECS_DIGEST_PERSONA").unwrap_or_default(),
                user_agent: env::var("ECS_DIGEST_UA").unwrap_or_default(),
            },
        })
    }

    /// The indexer's websocket push-channel URL, derived from
    /// `indexer_base_url` (`ws(s)://<host>/verana/indexer/v1/events`).
    #[must_use]
    pub fn indexer_ws_url(&self) -> String {
        let ws_base = self
            .indexer_base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{}/verana/indexer/v1/events", ws_base.trim_end_matches('/'))
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| Error::Config(format!("{key} is required")))
}

fn duration_secs(key: &str, default: u64) -> Result<Duration> {
    Ok(Duration::from_secs(int_env(key, default.try_into().unwrap_or(i64::MAX))?.try_into().unwrap_or(default)))
}

fn int_env(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| Error::Config(format!("{key} must be an integer, got {v}"))),
        Err(_) => Ok(default),
    }
}

fn float_env(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| Error::Config(format!("{key} must be a number, got {v}"))),
        Err(_) => Ok(default),
    }
}

fn bool_env(key: &str, default: bool) -> bool {
    env::var(key).map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes")).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_websocket_url_from_https_base() {
        let cfg = Config {
            database_url: String::new(),
            cache_url: String::new(),
            indexer_base_url: "https://indexer.verana.io/".to_string(),
            allowed_ecosystem_dids: vec![],
            role: Role::Leader,
            poll_interval: Duration::from_secs(5),
            object_cache_ttl: Duration::from_secs(86_400),
            trust_ttl: Duration::from_secs(3_600),
            ttl_refresh_ratio: 0.2,
            reattempt_retention_days: 7,
            listen_port: 8080,
            log_level: "info".into(),
            disable_digest_sri: false,
            ecs_digests: EcsDigests::default(),
        };
        assert_eq!(
            cfg.indexer_ws_url(),
            "wss://indexer.verana.io/verana/indexer/v1/events"
        );
    }
}
