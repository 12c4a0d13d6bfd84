use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::processing::types::ErrorKind;

/// Default inference service hosting feature-extraction pipelines.
pub const DEFAULT_EMBEDDING_API_URL: &str =
    "https://api-inference.huggingface.co/pipeline/feature-extraction";

const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_RESULT_SIZE: usize = 5;
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 120;
const DEFAULT_EMBEDDING_CONCURRENCY: usize = 4;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl ConfigError {
    /// Classify the error within the pipeline taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingVariable(_) => ErrorKind::ConfigurationMissing,
            Self::InvalidValue(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// Runtime configuration for the embedding visualizer.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bearer credential sent to the inference service.
    pub hf_token: String,
    /// Model identifier appended to the inference base URL.
    pub model_id: String,
    /// Base URL of the feature-extraction service.
    pub embedding_api_url: String,
    /// Default maximum number of characters taken from the document per chunk.
    pub chunk_size: usize,
    /// Default number of trailing characters carried into the next chunk.
    pub chunk_overlap: usize,
    /// Default number of best-matching chunks to highlight.
    pub result_size: usize,
    /// Upper bound for a single embedding, including waits for a loading model.
    pub embedding_timeout: Duration,
    /// Maximum number of embedding requests in flight at once.
    pub embedding_concurrency: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let loader = Loader { lookup };
        Ok(Self {
            hf_token: loader.required("HF_TOKEN")?,
            model_id: loader.required("MODEL_ID")?,
            embedding_api_url: loader
                .optional("EMBEDDING_API_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_API_URL.to_string()),
            chunk_size: loader.parsed_at_least("CHUNK_SIZE", DEFAULT_CHUNK_SIZE, 1)?,
            chunk_overlap: loader.parsed_at_least("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP, 0)?,
            result_size: loader.parsed_at_least("RESULT_SIZE", DEFAULT_RESULT_SIZE, 1)?,
            embedding_timeout: Duration::from_secs(loader.parsed_at_least(
                "EMBEDDING_TIMEOUT_SECS",
                DEFAULT_EMBEDDING_TIMEOUT_SECS,
                1,
            )?),
            embedding_concurrency: loader.parsed_at_least(
                "EMBEDDING_CONCURRENCY",
                DEFAULT_EMBEDDING_CONCURRENCY,
                1,
            )?,
            server_port: loader
                .optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Full feature-extraction endpoint for the configured model.
    pub fn embedding_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.embedding_api_url.trim_end_matches('/'),
            self.model_id.trim_start_matches('/')
        )
    }
}

struct Loader<F> {
    lookup: F,
}

impl<F> Loader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed_at_least<T>(&self, key: &str, default: T, minimum: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        match raw.parse::<T>() {
            Ok(value) if value >= minimum => Ok(value),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        }
    }
}

/// Load `.env` (when present) and then the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        model = %config.model_id,
        endpoint = %config.embedding_endpoint(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        result_size = config.result_size,
        concurrency = config.embedding_concurrency,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults_when_only_secrets_present() {
        let config =
            Config::from_lookup(lookup_from(&[("HF_TOKEN", "hf_abc"), ("MODEL_ID", "org/m")]))
                .expect("config");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.result_size, 5);
        assert_eq!(config.embedding_timeout, Duration::from_secs(120));
        assert_eq!(config.embedding_concurrency, 4);
        assert!(config.server_port.is_none());
        assert_eq!(
            config.embedding_endpoint(),
            "https://api-inference.huggingface.co/pipeline/feature-extraction/org/m"
        );
    }

    #[test]
    fn missing_credential_is_configuration_missing() {
        let error = Config::from_lookup(lookup_from(&[("MODEL_ID", "org/m")])).unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(ref key) if key == "HF_TOKEN"));
        assert_eq!(error.kind(), ErrorKind::ConfigurationMissing);

        let error =
            Config::from_lookup(lookup_from(&[("HF_TOKEN", "hf_abc"), ("MODEL_ID", "  ")]))
                .unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(ref key) if key == "MODEL_ID"));
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let error = Config::from_lookup(lookup_from(&[
            ("HF_TOKEN", "hf_abc"),
            ("MODEL_ID", "org/m"),
            ("CHUNK_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key) if key == "CHUNK_SIZE"));
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let error = Config::from_lookup(lookup_from(&[
            ("HF_TOKEN", "hf_abc"),
            ("MODEL_ID", "org/m"),
            ("RESULT_SIZE", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key) if key == "RESULT_SIZE"));
    }

    #[test]
    fn honors_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("HF_TOKEN", "hf_abc"),
            ("MODEL_ID", "sentence-transformers/all-MiniLM-L6-v2"),
            ("EMBEDDING_API_URL", "http://127.0.0.1:9000/"),
            ("CHUNK_SIZE", "64"),
            ("CHUNK_OVERLAP", "0"),
            ("RESULT_SIZE", "3"),
            ("EMBEDDING_TIMEOUT_SECS", "5"),
            ("EMBEDDING_CONCURRENCY", "1"),
            ("SERVER_PORT", "8088"),
        ]))
        .expect("config");
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.chunk_overlap, 0);
        assert_eq!(config.result_size, 3);
        assert_eq!(config.embedding_timeout, Duration::from_secs(5));
        assert_eq!(config.embedding_concurrency, 1);
        assert_eq!(config.server_port, Some(8088));
        assert_eq!(
            config.embedding_endpoint(),
            "http://127.0.0.1:9000/sentence-transformers/all-MiniLM-L6-v2"
        );
    }
}
