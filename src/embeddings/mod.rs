// Embeddings module
// Text-to-vector providers behind a single trait


pub mod hash;
pub mod ollama;
pub mod token_average;

use std::borrow::Cow;

use tracing::warn;

use crate::config::{EmbedderConfig, EmbedderProvider};
use crate::{FolktaleError, Result};

pub use hash::HashEmbedder;
pub use ollama::OllamaClient;
pub use token_average::TokenAverageEmbedder;

/// Maps text to a dense vector of fixed dimension.
///
/// Implementations must be deterministic for a fixed model and input. The
/// dimension is declared up front so callers can fail fast on a provider that
/// returns something else.
pub trait Embedder {
    /// Dimension of every vector this embedder returns
    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Embed and verify the vector matches the declared dimension
#[inline]
pub fn embed_checked(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let vector = embedder.embed(text)?;
    check_dimension(embedder.dimension(), &vector)?;
    Ok(vector)
}

/// Batch variant of [`embed_checked`]
#[inline]
pub fn embed_batch_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed_batch(texts)?;
    if vectors.len() != texts.len() {
        return Err(FolktaleError::Embedding(format!(
            "provider returned {} vectors for {} inputs",
            vectors.len(),
            texts.len()
        )));
    }
    for vector in &vectors {
        check_dimension(embedder.dimension(), vector)?;
    }
    Ok(vectors)
}

#[inline]
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(FolktaleError::Embedding(format!(
            "dimension mismatch: expected {}, provider returned {}",
            expected,
            vector.len()
        )));
    }
    Ok(())
}

/// Reject blank input and apply the explicit character limit.
///
/// Truncation keeps the leading `max_chars` characters and is always logged.
#[inline]
pub fn prepare_input(text: &str, max_chars: Option<usize>) -> Result<Cow<'_, str>> {
    if text.trim().is_empty() {
        return Err(FolktaleError::Embedding(
            "cannot embed empty text".to_string(),
        ));
    }

    let Some(limit) = max_chars else {
        return Ok(Cow::Borrowed(text));
    };

    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            warn!(
                "Truncating embedding input from {} to {} characters",
                text.chars().count(),
                limit
            );
            Ok(Cow::Owned(text[..cut].to_string()))
        }
        None => Ok(Cow::Borrowed(text)),
    }
}

/// Construct the configured provider
#[inline]
pub fn build_embedder(config: &EmbedderConfig) -> anyhow::Result<Box<dyn Embedder>> {
    use anyhow::Context;

    let dimension = config.dimension as usize;
    let embedder: Box<dyn Embedder> = match config.provider {
        EmbedderProvider::Ollama => Box::new(
            OllamaClient::new(config).context("Failed to initialize Ollama client")?,
        ),
        EmbedderProvider::Hash => Box::new(HashEmbedder::new(
            dimension,
            config.hash.ngram_min..=config.hash.ngram_max,
        )?),
        EmbedderProvider::TokenAverage => {
            let path = config.token_average.vectors_path.as_ref().context(
                "embedder.token_average.vectors_path must be set for the token_average provider",
            )?;
            let embedder = TokenAverageEmbedder::load(path)
                .with_context(|| format!("Failed to load word vectors from {}", path.display()))?;
            if embedder.dimension() != dimension {
                anyhow::bail!(
                    "word vectors have dimension {}, configuration declares {}",
                    embedder.dimension(),
                    dimension
                );
            }
            Box::new(embedder)
        }
    };
    Ok(embedder)
}
