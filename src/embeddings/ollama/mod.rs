
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, prepare_input};
use crate::FolktaleError;
use crate::config::EmbedderConfig;
use crate::http::{self, RequestError};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    dimension: usize,
    max_input_chars: Option<usize>,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let base_url = config
            .ollama
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.ollama.model.clone(),
            batch_size: config.ollama.batch_size,
            dimension: config.dimension as usize,
            max_input_chars: config.input_limit(),
            agent: http::build_agent(Duration::from_secs(config.ollama.timeout_secs), true),
            retry_attempts: config.ollama.retry_attempts,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = http::build_agent(timeout, true);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.validate_model().context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Validate that the configured model is available
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models().context("Failed to list models")?;

        if models.iter().any(|m| m.name == self.model) {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(anyhow::anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available_models
            ))
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = http::with_retry(self.base_url.as_str(), self.retry_attempts, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|e| anyhow::anyhow!("Failed to fetch models: {}", e))?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate embeddings for the given inputs in one request
    fn request_embeddings(&self, inputs: Vec<&str>) -> crate::Result<Vec<Vec<f32>>> {
        let expected = inputs.len();
        let request = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| FolktaleError::Embedding(format!("Failed to build embed URL: {}", e)))?;

        let request_json = serde_json::to_string(&request).map_err(|e| {
            FolktaleError::Embedding(format!("Failed to serialize embedding request: {}", e))
        })?;

        let response_text = http::with_retry(self.base_url.as_str(), self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|e| match e {
            RequestError::Transport(msg) => {
                FolktaleError::Embedding(format!("Ollama unavailable at {}: {}", self.base_url, msg))
            }
            other => FolktaleError::Embedding(format!("Ollama request failed: {}", other)),
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            FolktaleError::Embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        if response.embeddings.len() != expected {
            return Err(FolktaleError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                expected,
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let input = prepare_input(text, self.max_input_chars)?;
        debug!("Generating embedding for text (length: {})", input.len());

        self.request_embeddings(vec![&*input])?
            .pop()
            .ok_or_else(|| FolktaleError::Embedding("empty embedding response".to_string()))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = texts
            .iter()
            .map(|text| prepare_input(text, self.max_input_chars))
            .collect::<crate::Result<Vec<_>>>()?;

        let mut results = Vec::with_capacity(texts.len());
        for chunk in prepared.chunks(self.batch_size.max(1) as usize) {
            let inputs = chunk.iter().map(|input| &**input).collect();
            results.extend(self.request_embeddings(inputs)?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
