use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::services::DEFAULT_HOLD_SECS;

pub mod cors;

pub use cors::create_cors_layer;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
/// Thirty days.
const MAX_HOLD_SECS: i64 = 30 * 24 * 60 * 60;

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres connection string; without one the in-memory store is used.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub hold_duration_secs: i64,
    /// Zero disables the background sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            hold_duration_secs: DEFAULT_HOLD_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// their default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let hold_duration_secs =
            parse_or("HOLD_DURATION_SECS", &lookup, defaults.hold_duration_secs);
        let hold_duration_secs = if (1..=MAX_HOLD_SECS).contains(&hold_duration_secs) {
            hold_duration_secs
        } else {
            tracing::warn!(
                "HOLD_DURATION_SECS must be between 1 and {}, using default {}",
                MAX_HOLD_SECS,
                defaults.hold_duration_secs
            );
            defaults.hold_duration_secs
        };

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                &lookup,
                defaults.database_max_connections,
            ),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", &lookup, defaults.port),
            hold_duration_secs,
            sweep_interval_secs: parse_or(
                "SWEEP_INTERVAL_SECS",
                &lookup,
                defaults.sweep_interval_secs,
            ),
        }
    }

    pub fn hold_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_duration_secs)
    }

    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        (self.sweep_interval_secs > 0)
            .then(|| std::time::Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Invalid {} '{}': {}, using default {}", key, raw, e, default);
                default
            }
        },
    }
}
