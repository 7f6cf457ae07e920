//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor.
//!
//! AppState holds:
//! - **Clinic**: the lifecycle controller over the injected `ClinicStore`
//! - **Session config**: cookie key and session lifetime
//! - **Metrics handle**: Prometheus renderer, when a recorder is installed
//!
//! There is no process-wide store handle; everything reaches handlers
//! through this struct.

use std::str::FromStr;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use metrics_exporter_prometheus::PrometheusHandle;
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::lifecycle::Clinic;
use crate::session::{SessionConfig, DEFAULT_SESSION_TTL_SECS};
use crate::store::ClinicStore;

/// Minimum length of `SESSION_SECRET`.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Invalid configuration, reported at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),
}

/// Application configuration, read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Secret the session cookie key is derived from. `None` generates a
    /// per-process key, which signs everyone out on restart.
    pub session_secret: Option<String>,
    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,
    /// Set the `Secure` attribute on the session cookie. Disable only when
    /// serving plain HTTP in development.
    pub session_cookie_secure: bool,
    /// Upper bound of the Postgres pool.
    pub db_max_connections: u32,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
}

impl AppConfig {
    /// Build the configuration from `PORT`, `DATABASE_URL`, `SESSION_SECRET`,
    /// `SESSION_TTL_SECS`, `SESSION_COOKIE_SECURE`, `DB_MAX_CONNECTIONS` and
    /// `BCRYPT_COST`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let session_secret = non_empty("SESSION_SECRET");
        if let Some(secret) = &session_secret {
            if secret.len() < MIN_SESSION_SECRET_LEN {
                return Err(ConfigError::SecretTooShort(secret.len()));
            }
        }

        let bcrypt_cost = parse_or("BCRYPT_COST", non_empty("BCRYPT_COST"), defaults.bcrypt_cost)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31".into(),
            });
        }

        Ok(Self {
            port: parse_or("PORT", non_empty("PORT"), defaults.port)?,
            database_url: non_empty("DATABASE_URL"),
            session_secret,
            session_ttl_secs: parse_or(
                "SESSION_TTL_SECS",
                non_empty("SESSION_TTL_SECS"),
                defaults.session_ttl_secs,
            )?,
            session_cookie_secure: parse_or(
                "SESSION_COOKIE_SECURE",
                non_empty("SESSION_COOKIE_SECURE"),
                defaults.session_cookie_secure,
            )?,
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                non_empty("DB_MAX_CONNECTIONS"),
                defaults.db_max_connections,
            )?,
            bcrypt_cost,
        })
    }

    /// Derive the cookie key. Without a secret a random key is generated.
    pub fn session_key(&self) -> Key {
        match &self.session_secret {
            Some(secret) => {
                let digest = Sha512::digest(secret.as_bytes());
                Key::from(digest.as_slice())
            }
            None => {
                tracing::warn!(
                    "SESSION_SECRET not set, using a random key. \
                     Sessions will not survive restarts."
                );
                Key::generate()
            }
        }
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .field("db_max_connections", &self.db_max_connections)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            session_secret: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            session_cookie_secure: true,
            db_max_connections: 10,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub clinic: Clinic,
    pub session: SessionConfig,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, store: ClinicStore) -> Self {
        let session = SessionConfig::new(config.session_key(), config.session_ttl_secs)
            .with_secure(config.session_cookie_secure);
        let clinic = Clinic::new(store, config.bcrypt_cost);
        Self {
            config,
            clinic,
            session,
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.clinic.store().backend())
            .field("session", &self.session)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Lets `PrivateCookieJar` find the cookie key.
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.session.key().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert_eq!(config.db_max_connections, 10);
        assert!(config.database_url.is_none());
        assert!(config.session_secret.is_none());
        assert!(config.session_cookie_secure);
    }

    #[test]
    fn cookie_secure_flag_can_be_disabled() {
        let config =
            AppConfig::from_lookup(lookup(&[("SESSION_COOKIE_SECURE", "false")])).unwrap();
        assert!(!config.session_cookie_secure);
        let state = AppState::new(config, ClinicStore::in_memory());
        assert!(!state.session.secure());

        let err = AppConfig::from_lookup(lookup(&[("SESSION_COOKIE_SECURE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SESSION_COOKIE_SECURE", .. }));
    }

    #[test]
    fn reads_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/klinik"),
            ("SESSION_TTL_SECS", "60"),
            ("DB_MAX_CONNECTIONS", "3"),
            ("BCRYPT_COST", "4"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.db_max_connections, 3);
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/klinik")
        );
    }

    #[test]
    fn empty_database_url_means_memory() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn rejects_bad_port() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
    }

    #[test]
    fn rejects_short_secret() {
        let err = AppConfig::from_lookup(lookup(&[("SESSION_SECRET", "short")])).unwrap_err();
        assert!(matches!(err, ConfigError::SecretTooShort(5)));
    }

    #[test]
    fn rejects_out_of_range_cost() {
        let err = AppConfig::from_lookup(lookup(&[("BCRYPT_COST", "2")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "BCRYPT_COST", .. }));
    }

    #[test]
    fn same_secret_same_key() {
        let config = AppConfig {
            session_secret: Some("x".repeat(40)),
            ..AppConfig::default()
        };
        assert_eq!(config.session_key().master(), config.session_key().master());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            database_url: Some("postgres://user:hunter2@db/klinik".into()),
            session_secret: Some("s".repeat(40)),
            ..AppConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("ssss"));
    }
}
