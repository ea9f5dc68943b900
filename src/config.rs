use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: f64 = 0.15;
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";
const DEFAULT_OLLAMA_TEMPERATURE: f32 = 0.2;
const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 120;
const DEFAULT_STORAGE_DIR: &str = "civicwatch/storage";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the CivicWatch pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chunker sizing.
    pub chunker: ChunkerConfig,
    /// Language-model endpoint and sampling settings.
    pub oracle: OracleConfig,
    /// Root directory for chunk and summary caches.
    pub storage_dir: PathBuf,
}

/// Character budget and overlap used when splitting documents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkerConfig {
    /// Target chunk size in characters.
    pub target_size: usize,
    /// Fraction of `target_size` carried over from the previous chunk (0.0–1.0).
    pub overlap_ratio: f64,
}

impl ChunkerConfig {
    /// Number of trailing characters of a closed chunk that seed the next one.
    pub fn overlap_size(&self) -> usize {
        (self.target_size as f64 * self.overlap_ratio.clamp(0.0, 1.0)).floor() as usize
    }

    /// Reject a zero chunk size or an overlap ratio outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if !(0.0..=1.0).contains(&self.overlap_ratio) {
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".into()));
        }
        Ok(())
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_CHUNK_SIZE,
            overlap_ratio: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Connection settings for the Ollama-compatible completion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    /// Base URL of the Ollama runtime.
    pub base_url: String,
    /// Model identifier passed with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            temperature: DEFAULT_OLLAMA_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_OLLAMA_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// Every variable is optional; unset or blank values fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let chunker = ChunkerConfig {
            target_size: vars.parse("CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE),
            overlap_ratio: vars.parse("CHUNK_OVERLAP")?.unwrap_or(DEFAULT_CHUNK_OVERLAP),
        };
        chunker.validate()?;

        Ok(Self {
            chunker,
            oracle: OracleConfig {
                base_url: vars
                    .optional("OLLAMA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
                model: vars
                    .optional("OLLAMA_MODEL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                temperature: vars
                    .parse("OLLAMA_TEMPERATURE")?
                    .unwrap_or(DEFAULT_OLLAMA_TEMPERATURE),
                timeout: Duration::from_secs(
                    vars.parse("OLLAMA_TIMEOUT_SECS")?.unwrap_or(DEFAULT_OLLAMA_TIMEOUT_SECS),
                ),
            },
            storage_dir: vars
                .optional("CIVICWATCH_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
        })
    }

    /// Read the environment and log the resulting configuration.
    ///
    /// Call [`load_dotenv`] first so `.env` values are visible.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::from_env()?;
        tracing::debug!(
            chunk_size = config.chunker.target_size,
            chunk_overlap = config.chunker.overlap_ratio,
            model = %config.oracle.model,
            base_url = %config.oracle.base_url,
            storage_dir = %config.storage_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

/// Merge `.env` (if present) into the process environment without overriding set variables.
///
/// Runs before logging is initialised so `RUST_LOG` and `CIVICWATCH_LOG_FILE` from `.env` apply.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| {
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string()))
            })
            .transpose()
    }
}
