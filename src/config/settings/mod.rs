#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::document::FieldComposition;
use crate::http::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECONDS};
use crate::search::FieldWeights;
use crate::store::TextField;

pub const CONFIG_DIR_ENV: &str = "FOLKTALE_SEARCH_CONFIG_DIR";
pub const DEFAULT_INDEX_NAME: &str = "japanese-folktales-vector";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub lexical: LexicalConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection settings for the OpenSearch node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Name of the environment variable holding the password
    pub password_env: String,
    pub verify_certs: bool,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub index_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "localhost".to_string(),
            port: 9200,
            username: "admin".to_string(),
            password_env: "OPENSEARCH_INITIAL_ADMIN_PASSWORD".to_string(),
            verify_certs: false,
            timeout_secs: DEFAULT_TIMEOUT_SECONDS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            index_name: DEFAULT_INDEX_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderProvider {
    #[default]
    Ollama,
    Hash,
    TokenAverage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbedderConfig {
    pub provider: EmbedderProvider,
    /// Dimension every vector must have; also declared in the index schema
    pub dimension: u32,
    /// Inputs longer than this many characters are truncated, with a warning.
    /// Zero disables truncation.
    pub max_input_chars: usize,
    pub ollama: OllamaConfig,
    pub hash: HashConfig,
    pub token_average: TokenAverageConfig,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderProvider::default(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            max_input_chars: 2048,
            ollama: OllamaConfig::default(),
            hash: HashConfig::default(),
            token_average: TokenAverageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Must produce `embedder.dimension`-sized vectors. The default is
    /// multilingual, since the corpus is Japanese.
    pub model: String,
    pub batch_size: u32,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "bge-m3:latest".to_string(),
            batch_size: 16,
            timeout_secs: DEFAULT_TIMEOUT_SECONDS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HashConfig {
    pub ngram_min: usize,
    pub ngram_max: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            ngram_min: 1,
            ngram_max: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenAverageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectors_path: Option<PathBuf>,
}

/// Field weighting and composition, the tunable part of ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub composition: FieldComposition,
    pub offset: f32,
    pub weights: FieldWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            composition: FieldComposition::StoryWithAttributes,
            offset: 1.0,
            weights: FieldWeights::new(0.2, 0.8, 0.0),
        }
    }
}

/// Parameters of the more-like-this baseline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LexicalConfig {
    pub fields: Vec<TextField>,
    pub min_term_freq: u32,
    pub max_query_terms: u32,
    pub min_doc_freq: u32,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            fields: vec![TextField::Name, TextField::Story, TextField::Attributes],
            min_term_freq: 1,
            max_query_terms: 12,
            min_doc_freq: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub top_k: usize,
    pub report_path: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            report_path: PathBuf::from("evaluation_results.csv"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatasetConfig {
    /// JSON dataset; the built-in sample corpus is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid timeout: {0}s (must be between 1 and 3600)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid n-gram range: {0}..={1} (sizes must be between 1 and 8, min <= max)")]
    InvalidNgramRange(usize, usize),
    #[error("Invalid index name: '{0}' (must be non-empty lowercase without spaces)")]
    InvalidIndexName(String),
    #[error("Invalid {0} weight: {1} (must be finite and >= 0)")]
    InvalidWeight(&'static str, f32),
    #[error("Invalid score offset: {0} (must be finite)")]
    InvalidOffset(f32),
    #[error("Composition '{0}' has no attributes vector, but the attributes weight is {1}")]
    WeightWithoutField(FieldComposition, f32),
    #[error("Lexical search needs at least one field")]
    NoLexicalFields,
    #[error("Invalid {0}: {1} (must be at least 1)")]
    InvalidLexicalParameter(&'static str, u32),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Environment variable {0} is not set; it must hold the store password")]
    MissingPassword(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Resolve the configuration directory: explicit override, then
    /// `$FOLKTALE_SEARCH_CONFIG_DIR`, then the platform config directory.
    #[inline]
    pub fn config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = override_dir {
            return Ok(dir.to_path_buf());
        }

        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        dirs::config_dir()
            .map(|dir| dir.join("folktale-search"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.embedder.validate()?;
        self.scoring.validate()?;
        self.lexical.validate()?;

        if self.evaluation.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.evaluation.top_k));
        }

        Ok(())
    }
}

fn validate_endpoint(protocol: &str, host: &str, port: u16) -> Result<Url, ConfigError> {
    if protocol != "http" && protocol != "https" {
        return Err(ConfigError::InvalidProtocol(protocol.to_string()));
    }

    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }

    let url_str = format!("{}://{}:{}", protocol, host, port);
    Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
}

fn validate_request_limits(timeout_secs: u64, retry_attempts: u32) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&timeout_secs) {
        return Err(ConfigError::InvalidTimeout(timeout_secs));
    }

    if !(1..=10).contains(&retry_attempts) {
        return Err(ConfigError::InvalidRetryAttempts(retry_attempts));
    }

    Ok(())
}

impl StoreConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)?;
        validate_request_limits(self.timeout_secs, self.retry_attempts)?;

        let name = &self.index_name;
        if name.is_empty()
            || name.chars().any(|c| c.is_whitespace() || c.is_uppercase())
            || name.starts_with(['-', '_', '+'])
        {
            return Err(ConfigError::InvalidIndexName(name.clone()));
        }

        Ok(())
    }

    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)
    }

    /// Read the password from the configured environment variable
    #[inline]
    pub fn password(&self) -> Result<secrecy::SecretString, ConfigError> {
        std::env::var(&self.password_env)
            .ok()
            .filter(|p| !p.is_empty())
            .map(secrecy::SecretString::from)
            .ok_or_else(|| ConfigError::MissingPassword(self.password_env.clone()))
    }
}

impl EmbedderConfig {
    #[inline]
    pub fn input_limit(&self) -> Option<usize> {
        (self.max_input_chars > 0).then_some(self.max_input_chars)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        if self.provider == EmbedderProvider::Ollama {
            self.ollama.validate()?;
        }

        let HashConfig {
            ngram_min,
            ngram_max,
        } = self.hash;
        if ngram_min == 0 || ngram_max > 8 || ngram_min > ngram_max {
            return Err(ConfigError::InvalidNgramRange(ngram_min, ngram_max));
        }

        Ok(())
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        validate_request_limits(self.timeout_secs, self.retry_attempts)
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)
    }
}

impl ScoringConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, weight) in self.weights.named() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight(field, weight));
            }
        }

        if !self.offset.is_finite() {
            return Err(ConfigError::InvalidOffset(self.offset));
        }

        if self.weights.attributes > 0.0 && !self.composition.has_attributes_vector() {
            return Err(ConfigError::WeightWithoutField(
                self.composition,
                self.weights.attributes,
            ));
        }

        Ok(())
    }
}

impl LexicalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::NoLexicalFields);
        }
        if self.min_term_freq == 0 {
            return Err(ConfigError::InvalidLexicalParameter(
                "min_term_freq",
                self.min_term_freq,
            ));
        }
        if self.max_query_terms == 0 {
            return Err(ConfigError::InvalidLexicalParameter(
                "max_query_terms",
                self.max_query_terms,
            ));
        }
        if self.min_doc_freq == 0 {
            return Err(ConfigError::InvalidLexicalParameter(
                "min_doc_freq",
                self.min_doc_freq,
            ));
        }
        Ok(())
    }
}
