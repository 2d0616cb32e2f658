//! Environment-provided configuration
//!
//! All settings come from the process environment. A missing or malformed
//! required value is a startup error; the binary exits before serving.

use std::time::Duration;

use thiserror::Error;

pub const ENV_BACKEND: &str = "STREAM_BUS_BACKEND";
pub const ENV_HOST: &str = "STREAM_BUS_HOST";
pub const ENV_PORT: &str = "STREAM_BUS_PORT";
pub const ENV_USERNAME: &str = "STREAM_BUS_USERNAME";
pub const ENV_PASSWORD: &str = "STREAM_BUS_PASSWORD";
pub const ENV_DB: &str = "STREAM_BUS_DB";
pub const ENV_CONSUMER: &str = "STREAM_BUS_CONSUMER";
pub const ENV_GROUP: &str = "STREAM_BUS_GROUP";
pub const ENV_STREAMS: &str = "STREAM_BUS_STREAMS";
pub const ENV_AUTO_CREATE: &str = "STREAM_BUS_AUTO_CREATE";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "STREAM_BUS_CONNECT_TIMEOUT_MS";
pub const ENV_COMMAND_WAIT_MS: &str = "STREAM_BUS_COMMAND_WAIT_MS";
pub const ENV_BACKOFF_MIN_MS: &str = "STREAM_BUS_BACKOFF_MIN_MS";
pub const ENV_BACKOFF_MAX_MS: &str = "STREAM_BUS_BACKOFF_MAX_MS";
pub const ENV_DRAIN_TIMEOUT_MS: &str = "STREAM_BUS_DRAIN_TIMEOUT_MS";
pub const ENV_SERVER_NAME: &str = "STREAM_BUS_SERVER_NAME";

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the external store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub connect_timeout: Duration,
    /// How long a command waits for the supervisor to restore a lost session
    pub command_wait: Duration,
}

impl StoreConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            db: 0,
            connect_timeout: Duration::from_millis(5_000),
            command_wait: Duration::from_millis(5_000),
        }
    }
}

/// Which store implementation backs the stream primitives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Redis(StoreConfig),
    /// In-process store, for local development
    Memory,
}

/// Consumer identity and the groups to establish at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub consumer: String,
    pub group: Option<String>,
    pub streams: Vec<String>,
    /// Create missing streams when establishing groups
    pub auto_create_streams: bool,
}

/// Reconnect and shutdown timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub drain_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub server_name: String,
    pub backend: Backend,
    pub consumer: ConsumerConfig,
    pub supervisor: SupervisorConfig,
}

impl BusConfig {
    /// Load from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get(ENV_BACKEND).as_deref().unwrap_or("redis") {
            "redis" => Backend::Redis(store_config(&get)?),
            "memory" => Backend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: ENV_BACKEND,
                    value: other.to_string(),
                    reason: "expected 'redis' or 'memory'".to_string(),
                })
            }
        };

        let consumer = ConsumerConfig {
            consumer: get(ENV_CONSUMER)
                .unwrap_or_else(|| format!("consumer-{}", std::process::id())),
            group: get(ENV_GROUP),
            streams: get(ENV_STREAMS)
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            auto_create_streams: parse_or(&get, ENV_AUTO_CREATE, parse_bool, true)?,
        };

        if !consumer.streams.is_empty() && consumer.group.is_none() {
            return Err(ConfigError::Missing(ENV_GROUP));
        }

        let defaults = SupervisorConfig::default();
        let supervisor = SupervisorConfig {
            backoff_min: parse_or(&get, ENV_BACKOFF_MIN_MS, parse_millis, defaults.backoff_min)?,
            backoff_max: parse_or(&get, ENV_BACKOFF_MAX_MS, parse_millis, defaults.backoff_max)?,
            drain_timeout: parse_or(
                &get,
                ENV_DRAIN_TIMEOUT_MS,
                parse_millis,
                defaults.drain_timeout,
            )?,
        };
        if supervisor.backoff_min.is_zero() {
            return Err(ConfigError::Invalid {
                key: ENV_BACKOFF_MIN_MS,
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if supervisor.backoff_min > supervisor.backoff_max {
            return Err(ConfigError::Invalid {
                key: ENV_BACKOFF_MIN_MS,
                value: supervisor.backoff_min.as_millis().to_string(),
                reason: format!("greater than {}", ENV_BACKOFF_MAX_MS),
            });
        }

        Ok(Self {
            server_name: get(ENV_SERVER_NAME).unwrap_or_else(|| "stream-bus".to_string()),
            backend,
            consumer,
            supervisor,
        })
    }
}

fn store_config<G>(get: &G) -> ConfigResult<StoreConfig>
where
    G: Fn(&str) -> Option<String>,
{
    let host = get(ENV_HOST).ok_or(ConfigError::Missing(ENV_HOST))?;
    let port = get(ENV_PORT).ok_or(ConfigError::Missing(ENV_PORT))?;
    let port = port.parse::<u16>().map_err(|e| ConfigError::Invalid {
        key: ENV_PORT,
        value: port.clone(),
        reason: e.to_string(),
    })?;

    let mut store = StoreConfig::new(host, port);
    store.username = get(ENV_USERNAME);
    store.password = get(ENV_PASSWORD);
    store.db = parse_or(get, ENV_DB, |v| v.parse::<i64>().map_err(|e| e.to_string()), 0)?;
    store.connect_timeout =
        parse_or(get, ENV_CONNECT_TIMEOUT_MS, parse_millis, store.connect_timeout)?;
    store.command_wait = parse_or(get, ENV_COMMAND_WAIT_MS, parse_millis, store.command_wait)?;
    Ok(store)
}

fn parse_or<G, T, P>(get: &G, key: &'static str, parse: P, default: T) -> ConfigResult<T>
where
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, String>,
{
    match get(key) {
        Some(value) => parse(value.trim()).map_err(|reason| ConfigError::Invalid {
            key,
            value,
            reason,
        }),
        None => Ok(default),
    }
}

fn parse_millis(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| e.to_string())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("not a boolean: {}", other)),
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_redis_backend_requires_host_and_port() {
        let err = BusConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_HOST));

        let err = BusConfig::from_lookup(lookup(&[(ENV_HOST, "localhost")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_PORT));
    }

    #[test]
    fn test_full_redis_config() {
        let config = BusConfig::from_lookup(lookup(&[
            (ENV_HOST, "store.internal"),
            (ENV_PORT, "6380"),
            (ENV_PASSWORD, "s3cret"),
            (ENV_CONSUMER, "w1"),
            (ENV_GROUP, "watchers"),
            (ENV_STREAMS, "health, jobs,,"),
            (ENV_BACKOFF_MAX_MS, "5000"),
        ]))
        .unwrap();

        match &config.backend {
            Backend::Redis(store) => {
                assert_eq!(store.host, "store.internal");
                assert_eq!(store.port, 6380);
                assert_eq!(store.password.as_deref(), Some("s3cret"));
                assert_eq!(store.db, 0);
            }
            Backend::Memory => panic!("expected redis backend"),
        }
        assert_eq!(config.consumer.consumer, "w1");
        assert_eq!(config.consumer.streams, vec!["health", "jobs"]);
        assert!(config.consumer.auto_create_streams);
        assert_eq!(config.supervisor.backoff_max, Duration::from_secs(5));
        assert_eq!(config.supervisor.backoff_min, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = BusConfig::from_lookup(lookup(&[(ENV_HOST, "h"), (ENV_PORT, "99999")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_PORT, .. }));
    }

    #[test]
    fn test_memory_backend_needs_no_store() {
        let config = BusConfig::from_lookup(lookup(&[(ENV_BACKEND, "memory")])).unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert!(config.consumer.consumer.starts_with("consumer-"));
    }

    #[test]
    fn test_streams_without_group_is_rejected() {
        let err = BusConfig::from_lookup(lookup(&[
            (ENV_BACKEND, "memory"),
            (ENV_STREAMS, "health"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_GROUP));
    }

    #[test]
    fn test_backoff_bounds_are_checked() {
        let err = BusConfig::from_lookup(lookup(&[
            (ENV_BACKEND, "memory"),
            (ENV_BACKOFF_MIN_MS, "60000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_BACKOFF_MIN_MS, .. }));
    }

    #[test]
    fn test_zero_backoff_min_is_rejected() {
        let err = BusConfig::from_lookup(lookup(&[
            (ENV_BACKEND, "memory"),
            (ENV_BACKOFF_MIN_MS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_BACKOFF_MIN_MS, .. }));
    }
}
