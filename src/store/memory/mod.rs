
mod terms;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info};
use uuid::Uuid;

use super::{
    DocumentStore, IndexSchema, MoreLikeThisQuery, QuerySpec, StoreHit, WeightedCosineQuery,
};
use crate::document::EmbeddedDocument;
use crate::search::cosine_similarity;
use crate::{FolktaleError, Result};

/// In-process document store.
///
/// Scores weighted-cosine queries exactly as the server-side script does and
/// approximates more-like-this with BM25-weighted term overlap. Suited to tests,
/// benchmarks and corpora small enough to scan.
#[derive(Debug, Default)]
pub struct MemoryStore {
    indices: RwLock<HashMap<String, MemoryIndex>>,
}

#[derive(Debug)]
struct MemoryIndex {
    schema: IndexSchema,
    documents: Vec<StoredDocument>,
}

#[derive(Debug)]
struct StoredDocument {
    id: String,
    document: EmbeddedDocument,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_index<T>(&self, index: &str, f: impl FnOnce(&MemoryIndex) -> Result<T>) -> Result<T> {
        let indices = self.indices.read().unwrap_or_else(PoisonError::into_inner);
        let found = indices
            .get(index)
            .ok_or_else(|| FolktaleError::Store(format!("no such index: {}", index)))?;
        f(found)
    }
}

impl DocumentStore for MemoryStore {
    #[inline]
    fn index_exists(&self, index: &str) -> Result<bool> {
        let indices = self.indices.read().unwrap_or_else(PoisonError::into_inner);
        Ok(indices.contains_key(index))
    }

    #[inline]
    fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let mut indices = self.indices.write().unwrap_or_else(PoisonError::into_inner);
        if indices.contains_key(index) {
            return Err(FolktaleError::Store(format!(
                "index already exists: {}",
                index
            )));
        }
        indices.insert(
            index.to_string(),
            MemoryIndex {
                schema: schema.clone(),
                documents: Vec::new(),
            },
        );
        info!("Created in-memory index {}", index);
        Ok(())
    }

    #[inline]
    fn delete_index(&self, index: &str) -> Result<()> {
        let mut indices = self.indices.write().unwrap_or_else(PoisonError::into_inner);
        indices
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| FolktaleError::Store(format!("no such index: {}", index)))
    }

    #[inline]
    fn index_document(&self, index: &str, document: &EmbeddedDocument) -> Result<String> {
        let mut indices = self.indices.write().unwrap_or_else(PoisonError::into_inner);
        let target = indices
            .get_mut(index)
            .ok_or_else(|| FolktaleError::Store(format!("no such index: {}", index)))?;

        target.schema.validate_document(document)?;

        let id = Uuid::new_v4().simple().to_string();
        target.documents.push(StoredDocument {
            id: id.clone(),
            document: document.clone(),
        });
        debug!("Stored '{}' as {}", document.name, id);
        Ok(id)
    }

    #[inline]
    fn refresh(&self, index: &str) -> Result<()> {
        self.with_index(index, |_| Ok(()))
    }

    #[inline]
    fn count(&self, index: &str) -> Result<usize> {
        self.with_index(index, |found| Ok(found.documents.len()))
    }

    #[inline]
    fn search(&self, index: &str, query: &QuerySpec) -> Result<Vec<StoreHit>> {
        self.with_index(index, |found| match query {
            QuerySpec::WeightedCosine(q) => found.weighted_cosine(q),
            QuerySpec::MoreLikeThis(q) => Ok(found.more_like_this(q)),
        })
    }
}

impl MemoryIndex {
    fn weighted_cosine(&self, query: &WeightedCosineQuery) -> Result<Vec<StoreHit>> {
        self.schema.check_weights(&query.weights)?;
        if query.vector.len() != self.schema.dimension {
            return Err(FolktaleError::IndexSchema(format!(
                "query vector has dimension {}, index declares {}",
                query.vector.len(),
                self.schema.dimension
            )));
        }

        let active: Vec<_> = query.weights.active().collect();
        let scored = self.documents.iter().map(|stored| {
            let similarity: f32 = active
                .iter()
                .filter_map(|&(field, weight)| {
                    stored
                        .document
                        .vector(field)
                        .map(|vector| weight * cosine_similarity(&query.vector, vector))
                })
                .sum();
            (stored, similarity + query.offset)
        });

        Ok(rank(scored, query.size))
    }

    fn more_like_this(&self, query: &MoreLikeThisQuery) -> Vec<StoreHit> {
        let documents: Vec<&EmbeddedDocument> =
            self.documents.iter().map(|stored| &stored.document).collect();
        let scores = terms::more_like_this(&documents, query);

        let scored = self
            .documents
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .map(|(stored, score)| (stored, score as f32));

        rank(scored, query.size)
    }
}

/// Sort best first, keeping insertion order among equal scores
fn rank<'a>(
    scored: impl Iterator<Item = (&'a StoredDocument, f32)>,
    size: usize,
) -> Vec<StoreHit> {
    let mut hits: Vec<StoreHit> = scored
        .map(|(stored, score)| StoreHit {
            id: stored.id.clone(),
            name: stored.document.name.clone(),
            score,
        })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(size);
    hits
}
