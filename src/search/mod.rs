// Search module
// Weighted multi-field vector ranking and the lexical comparison baseline


pub mod lexical;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::VectorField;
use crate::embeddings::{Embedder, embed_checked};
use crate::store::{DocumentStore, IndexSchema, QuerySpec, StoreHit, WeightedCosineQuery};
use crate::{FolktaleError, Result};

pub use lexical::LexicalBaseline;

/// Calculate cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors give 0.
#[must_use]
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Per-field weights. They need not sum to 1; each must be finite and >= 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub name: f32,
    pub story: f32,
    pub attributes: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self::new(0.2, 0.8, 0.0)
    }
}

impl FieldWeights {
    #[inline]
    pub const fn new(name: f32, story: f32, attributes: f32) -> Self {
        Self {
            name,
            story,
            attributes,
        }
    }

    #[inline]
    pub const fn get(&self, field: VectorField) -> f32 {
        match field {
            VectorField::Name => self.name,
            VectorField::Story => self.story,
            VectorField::Attributes => self.attributes,
        }
    }

    #[inline]
    pub const fn named(&self) -> [(&'static str, f32); 3] {
        [
            ("name", self.name),
            ("story", self.story),
            ("attributes", self.attributes),
        ]
    }

    /// Fields with a strictly positive weight; zero-weight fields are skipped
    #[inline]
    pub fn active(&self) -> impl Iterator<Item = (VectorField, f32)> + '_ {
        VectorField::ALL
            .into_iter()
            .map(|field| (field, self.get(field)))
            .filter(|&(_, weight)| weight > 0.0)
    }

    #[inline]
    pub fn total(&self) -> f32 {
        self.name + self.story + self.attributes
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        for (field, weight) in self.named() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(FolktaleError::Validation(format!(
                    "{} weight must be finite and >= 0, got {}",
                    field, weight
                )));
            }
        }
        Ok(())
    }
}

/// A query string with the weights to rank it by
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedQuery {
    pub text: String,
    pub weights: FieldWeights,
}

impl WeightedQuery {
    #[inline]
    pub fn new(text: impl Into<String>, weights: FieldWeights) -> Self {
        Self {
            text: text.into(),
            weights,
        }
    }
}

/// A ranked result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredHit {
    pub name: String,
    pub score: f32,
}

impl From<StoreHit> for ScoredHit {
    #[inline]
    fn from(hit: StoreHit) -> Self {
        Self {
            name: hit.name,
            score: hit.score,
        }
    }
}

/// Order hits best first and cap them at `top_k`. The sort is stable, so equal
/// scores keep the order the store returned them in.
#[inline]
pub fn rank_hits(hits: Vec<StoreHit>, top_k: usize) -> Vec<ScoredHit> {
    let mut ranked: Vec<ScoredHit> = hits.into_iter().map(ScoredHit::from).collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_k);
    ranked
}

#[inline]
pub fn reject_blank_query(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(FolktaleError::Validation(
            "query text must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Ranks documents by `offset + Σ weight × cosine(query, field vector)`.
///
/// The query is embedded with the same embedder the index was built with.
pub struct Scorer<'a> {
    store: &'a dyn DocumentStore,
    embedder: &'a dyn Embedder,
    index: String,
    schema: IndexSchema,
    offset: f32,
}

impl<'a> Scorer<'a> {
    #[inline]
    pub fn new(
        store: &'a dyn DocumentStore,
        embedder: &'a dyn Embedder,
        index: impl Into<String>,
        schema: IndexSchema,
        offset: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            index: index.into(),
            schema,
            offset,
        }
    }

    #[inline]
    pub fn search(&self, query: &WeightedQuery, top_k: usize) -> Result<Vec<ScoredHit>> {
        reject_blank_query(&query.text)?;
        query.weights.validate()?;
        self.schema.check_weights(&query.weights)?;

        if top_k == 0 {
            return Ok(Vec::new());
        }

        if query.weights.total() > self.offset {
            warn!(
                "Weights sum to {} but offset is {}; scores can go negative",
                query.weights.total(),
                self.offset
            );
        }

        let vector = embed_checked(self.embedder, &query.text)?;
        if vector.len() != self.schema.dimension {
            return Err(FolktaleError::IndexSchema(format!(
                "embedder produces {} dimensions, index declares {}",
                vector.len(),
                self.schema.dimension
            )));
        }

        let spec = QuerySpec::WeightedCosine(WeightedCosineQuery {
            vector,
            weights: query.weights,
            offset: self.offset,
            size: top_k,
        });

        let hits = self.store.search(&self.index, &spec)?;
        debug!("Vector search for '{}' returned {} hits", query.text, hits.len());
        Ok(rank_hits(hits, top_k))
    }
}
