//! Authorizer configuration sourced from environment variables, with an
//! optional YAML file (`WARDEN_CONFIG`) overriding individual fields.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_PG_STATEMENT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REGISTRY_CACHE_TTL_MS: u64 = 30_000;
pub const DEFAULT_CONSUMER_MAX_IN_FLIGHT: usize = 16;
pub const DEFAULT_CONSUMER_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            other => bail!("unknown storage backend {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub max_in_flight: usize,
    pub poll_interval: Duration,
    pub handler_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_CONSUMER_MAX_IN_FLIGHT,
            poll_interval: Duration::from_millis(DEFAULT_CONSUMER_POLL_INTERVAL_MS),
            handler_timeout: Duration::from_millis(DEFAULT_HANDLER_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    pub bind_addr: SocketAddr,
    pub internal_bind: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub directory_url: Option<String>,
    pub introspect_url: Option<String>,
    pub registry_cache_ttl: Duration,
    pub consumer: ConsumerConfig,
    pub reaper_interval: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorizerConfigOverride {
    bind_addr: Option<String>,
    internal_bind: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    pg_url: Option<String>,
    pg_max_connections: Option<u32>,
    pg_acquire_timeout_ms: Option<u64>,
    pg_statement_timeout_ms: Option<u64>,
    directory_url: Option<String>,
    introspect_url: Option<String>,
    registry_cache_ttl_ms: Option<u64>,
    consumer_max_in_flight: Option<usize>,
    consumer_poll_interval_ms: Option<u64>,
    handler_timeout_ms: Option<u64>,
    reaper_interval_secs: Option<u64>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

impl AuthorizerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("WARDEN_BIND", "0.0.0.0:9080")
            .parse()
            .with_context(|| "parse WARDEN_BIND")?;
        let internal_bind = env_or("WARDEN_INTERNAL_BIND", "127.0.0.1:9081")
            .parse()
            .with_context(|| "parse WARDEN_INTERNAL_BIND")?;
        let metrics_bind = env_or("WARDEN_METRICS_BIND", "0.0.0.0:9090")
            .parse()
            .with_context(|| "parse WARDEN_METRICS_BIND")?;
        let storage = env_or("WARDEN_STORAGE", "memory")
            .parse()
            .with_context(|| "parse WARDEN_STORAGE")?;
        let postgres = match std::env::var("WARDEN_PG_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_parse(
                    "WARDEN_PG_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                acquire_timeout_ms: env_parse(
                    "WARDEN_PG_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
                )?,
                statement_timeout_ms: env_parse(
                    "WARDEN_PG_STATEMENT_TIMEOUT_MS",
                    DEFAULT_PG_STATEMENT_TIMEOUT_MS,
                )?,
            }),
            Err(_) => None,
        };
        let config = Self {
            bind_addr,
            internal_bind,
            metrics_bind,
            storage,
            postgres,
            directory_url: std::env::var("WARDEN_DIRECTORY_URL").ok(),
            introspect_url: std::env::var("WARDEN_INTROSPECT_URL").ok(),
            registry_cache_ttl: Duration::from_millis(env_parse(
                "WARDEN_REGISTRY_CACHE_TTL_MS",
                DEFAULT_REGISTRY_CACHE_TTL_MS,
            )?),
            consumer: ConsumerConfig {
                max_in_flight: env_parse(
                    "WARDEN_CONSUMER_MAX_IN_FLIGHT",
                    DEFAULT_CONSUMER_MAX_IN_FLIGHT,
                )?,
                poll_interval: Duration::from_millis(env_parse(
                    "WARDEN_CONSUMER_POLL_INTERVAL_MS",
                    DEFAULT_CONSUMER_POLL_INTERVAL_MS,
                )?),
                handler_timeout: Duration::from_millis(env_parse(
                    "WARDEN_HANDLER_TIMEOUT_MS",
                    DEFAULT_HANDLER_TIMEOUT_MS,
                )?),
            },
            reaper_interval: Duration::from_secs(env_parse(
                "WARDEN_REAPER_INTERVAL_SECS",
                DEFAULT_REAPER_INTERVAL_SECS,
            )?),
        };
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("WARDEN_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read WARDEN_CONFIG: {path}"))?;
            let override_cfg: AuthorizerConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse authorizer config yaml")?;
            config.apply(override_cfg)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, override_cfg: AuthorizerConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.internal_bind {
            self.internal_bind = value.parse().with_context(|| "parse internal_bind")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value.parse().with_context(|| "parse storage")?;
        }
        if let Some(url) = override_cfg.pg_url {
            let pg = self.postgres.get_or_insert_with(|| PostgresConfig {
                url: String::new(),
                max_connections: DEFAULT_PG_MAX_CONNECTIONS,
                acquire_timeout_ms: DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
                statement_timeout_ms: DEFAULT_PG_STATEMENT_TIMEOUT_MS,
            });
            pg.url = url;
        }
        if let Some(pg) = self.postgres.as_mut() {
            if let Some(value) = override_cfg.pg_max_connections {
                pg.max_connections = value;
            }
            if let Some(value) = override_cfg.pg_acquire_timeout_ms {
                pg.acquire_timeout_ms = value;
            }
            if let Some(value) = override_cfg.pg_statement_timeout_ms {
                pg.statement_timeout_ms = value;
            }
        }
        if let Some(value) = override_cfg.directory_url {
            self.directory_url = Some(value);
        }
        if let Some(value) = override_cfg.introspect_url {
            self.introspect_url = Some(value);
        }
        if let Some(value) = override_cfg.registry_cache_ttl_ms {
            self.registry_cache_ttl = Duration::from_millis(value);
        }
        if let Some(value) = override_cfg.consumer_max_in_flight {
            self.consumer.max_in_flight = value;
        }
        if let Some(value) = override_cfg.consumer_poll_interval_ms {
            self.consumer.poll_interval = Duration::from_millis(value);
        }
        if let Some(value) = override_cfg.handler_timeout_ms {
            self.consumer.handler_timeout = Duration::from_millis(value);
        }
        if let Some(value) = override_cfg.reaper_interval_secs {
            self.reaper_interval = Duration::from_secs(value);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.storage == StorageBackend::Postgres && self.postgres.is_none() {
            bail!("WARDEN_STORAGE=postgres requires WARDEN_PG_URL");
        }
        if self.consumer.max_in_flight == 0 {
            bail!("consumer max_in_flight must be at least 1");
        }
        if self.reaper_interval.is_zero() {
            bail!("reaper interval must be positive");
        }
        Ok(())
    }
}
