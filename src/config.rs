//! Environment-driven settings.
//!
//! Every knob has a default so `writer-vss` runs against a local SQLite file
//! with the offline hashing embedder out of the box. Variables:
//!
//! | Variable | Default |
//! |---|---|
//! | `WRITERS_BACKEND` | `sqlite` (`sqlite`, `redis`, `memory`) |
//! | `WRITERS_DB` | `./writers.db` |
//! | `WRITERS_REDIS_URL` / `REDIS_URL` | `redis://127.0.0.1:6379` |
//! | `WRITERS_REDIS_INDEX` | `demo:writers:idx_vss` |
//! | `WRITERS_REDIS_PREFIX` | `demo:writers:` |
//! | `WRITERS_INDEX_METRIC` | `cosine` |
//! | `WRITERS_EMBEDDING_PROVIDER` | `hashing` (`hashing`, `openai`, `local`) |
//! | `WRITERS_EMBEDDING_MODEL` | provider specific |
//! | `WRITERS_EMBEDDING_API_KEY` | empty; required for `openai` without a base URL |
//! | `WRITERS_EMBEDDING_BASE_URL` | provider specific |
//! | `WRITERS_DIMENSION` | `384` |
//! | `WRITERS_BATCH_SIZE` | `1000` |
//! | `WRITERS_CONCURRENCY` | `4` |
//! | `WRITERS_TIMEOUT_MS` | `30000` |
//! | `WRITERS_CONNECT_RETRIES` | `3` |
//! | `WRITERS_STALENESS` | `always-recompute` |

use crate::domain::values::metric::DistanceMetric;
use crate::domain::values::staleness::StalenessPolicy;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Unknown backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Hashing,
    OpenAi,
    Local,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashing" => Ok(ProviderKind::Hashing),
            "openai" => Ok(ProviderKind::OpenAi),
            "local" | "fastembed" => Ok(ProviderKind::Local),
            _ => Err(format!("Unknown embedding provider: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
    pub index: String,
    pub prefix: String,
    pub metric: DistanceMetric,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            index: "demo:writers:idx_vss".to_string(),
            prefix: "demo:writers:".to_string(),
            metric: DistanceMetric::Cosine,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Hashing,
            model: None,
            api_key: String::new(),
            base_url: None,
        }
    }
}

/// Knobs shared by every backend once the engine is running.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout: Duration,
    pub staleness: StalenessPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            concurrency: 4,
            timeout: Duration::from_millis(30_000),
            staleness: StalenessPolicy::AlwaysRecompute,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: StoreBackend,
    pub db_path: String,
    pub redis: RedisSettings,
    pub embedding: EmbeddingSettings,
    pub dimension: usize,
    pub connect_retries: u32,
    pub engine: EngineOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            db_path: "./writers.db".to_string(),
            redis: RedisSettings::default(),
            embedding: EmbeddingSettings::default(),
            dimension: 384,
            connect_retries: 3,
            engine: EngineOptions::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let redis_url = env::var("WRITERS_REDIS_URL")
            .or_else(|_| env::var("REDIS_URL"))
            .unwrap_or(defaults.redis.url);

        let settings = Self {
            backend: env_parse("WRITERS_BACKEND", defaults.backend)?,
            db_path: env_or_default("WRITERS_DB", &defaults.db_path),
            redis: RedisSettings {
                url: redis_url,
                index: env_or_default("WRITERS_REDIS_INDEX", &defaults.redis.index),
                prefix: env_or_default("WRITERS_REDIS_PREFIX", &defaults.redis.prefix),
                metric: env_parse("WRITERS_INDEX_METRIC", defaults.redis.metric)?,
            },
            embedding: embedding_from_env(defaults.embedding.provider)?,
            dimension: env_parse("WRITERS_DIMENSION", defaults.dimension)?,
            connect_retries: env_parse("WRITERS_CONNECT_RETRIES", defaults.connect_retries)?,
            engine: EngineOptions {
                batch_size: env_parse("WRITERS_BATCH_SIZE", defaults.engine.batch_size)?,
                concurrency: env_parse("WRITERS_CONCURRENCY", defaults.engine.concurrency)?,
                timeout: Duration::from_millis(env_parse(
                    "WRITERS_TIMEOUT_MS",
                    defaults.engine.timeout.as_millis() as u64,
                )?),
                staleness: env_parse("WRITERS_STALENESS", defaults.engine.staleness)?,
            },
        };

        if settings.dimension == 0 {
            return Err(ConfigError::ParseError {
                key: "WRITERS_DIMENSION".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }
        if settings.engine.concurrency == 0 {
            return Err(ConfigError::ParseError {
                key: "WRITERS_CONCURRENCY".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }
        Ok(settings)
    }
}

fn embedding_from_env(default_provider: ProviderKind) -> Result<EmbeddingSettings, ConfigError> {
    let provider = env_parse("WRITERS_EMBEDDING_PROVIDER", default_provider)?;
    let base_url = env::var("WRITERS_EMBEDDING_BASE_URL").ok();
    // The hosted OpenAI endpoint needs a key; self-hosted compatible servers may not.
    let api_key = if provider == ProviderKind::OpenAi && base_url.is_none() {
        env_required("WRITERS_EMBEDDING_API_KEY")?
    } else {
        env::var("WRITERS_EMBEDDING_API_KEY").unwrap_or_default()
    };
    Ok(EmbeddingSettings {
        provider,
        model: env::var("WRITERS_EMBEDDING_MODEL").ok(),
        api_key,
        base_url,
    })
}

pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse `key` if set, otherwise return `default`.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
