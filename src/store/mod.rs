// Document store module
// The vector-capable store the index manager writes to and the scorers query


pub mod memory;
pub mod opensearch;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{EmbeddedDocument, FieldComposition, VectorField};
use crate::search::FieldWeights;
use crate::{FolktaleError, Result};

pub use memory::MemoryStore;
pub use opensearch::OpenSearchStore;

/// A text field of an indexed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Name,
    Story,
    /// Mapped as a keyword: each attribute is one exact term
    Attributes,
}

impl TextField {
    #[inline]
    pub const fn property(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Story => "story",
            Self::Attributes => "attributes",
        }
    }

    #[inline]
    pub const fn is_keyword(self) -> bool {
        matches!(self, Self::Attributes)
    }
}

impl fmt::Display for TextField {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}

/// Declared layout of an index: text fields are fixed, vector fields follow the
/// composition policy and share one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub dimension: usize,
    pub vector_fields: Vec<VectorField>,
}

impl IndexSchema {
    #[inline]
    pub fn new(composition: FieldComposition, dimension: usize) -> Self {
        Self {
            dimension,
            vector_fields: composition.vector_fields().to_vec(),
        }
    }

    #[inline]
    pub fn has_vector(&self, field: VectorField) -> bool {
        self.vector_fields.contains(&field)
    }

    /// Reject a document whose vectors do not match the declared fields
    #[inline]
    pub fn validate_document(&self, document: &EmbeddedDocument) -> Result<()> {
        for field in VectorField::ALL {
            match (self.has_vector(field), document.vector(field)) {
                (true, None) => {
                    return Err(FolktaleError::IndexSchema(format!(
                        "document '{}' is missing required field {}",
                        document.name,
                        field.property()
                    )));
                }
                (true, Some(vector)) if vector.len() != self.dimension => {
                    return Err(FolktaleError::IndexSchema(format!(
                        "document '{}': {} has dimension {}, schema declares {}",
                        document.name,
                        field.property(),
                        vector.len(),
                        self.dimension
                    )));
                }
                (false, Some(_)) => {
                    return Err(FolktaleError::IndexSchema(format!(
                        "document '{}' carries {} which the schema does not declare",
                        document.name,
                        field.property()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Every positively weighted field must exist in the schema
    #[inline]
    pub fn check_weights(&self, weights: &FieldWeights) -> Result<()> {
        for (field, weight) in weights.active() {
            if !self.has_vector(field) {
                return Err(FolktaleError::IndexSchema(format!(
                    "weight {} given for {}, which this index does not have",
                    weight,
                    field.property()
                )));
            }
        }
        Ok(())
    }
}

/// Full-corpus match scored by `offset + Σ weight × cosine(vector, field)`
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCosineQuery {
    pub vector: Vec<f32>,
    pub weights: FieldWeights,
    pub offset: f32,
    pub size: usize,
}

/// Term-overlap query against the text fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoreLikeThisQuery {
    pub like: String,
    pub fields: Vec<TextField>,
    pub min_term_freq: u32,
    pub max_query_terms: u32,
    pub min_doc_freq: u32,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpec {
    WeightedCosine(WeightedCosineQuery),
    MoreLikeThis(MoreLikeThisQuery),
}

impl QuerySpec {
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::WeightedCosine(q) => q.size,
            Self::MoreLikeThis(q) => q.size,
        }
    }
}

/// One hit as returned by the store, best first
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: String,
    pub name: String,
    pub score: f32,
}

/// Operations the core needs from a vector-capable document store.
///
/// Hits come back sorted by score descending. Ties keep the store's own order.
pub trait DocumentStore {
    fn index_exists(&self, index: &str) -> Result<bool>;

    fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()>;

    fn delete_index(&self, index: &str) -> Result<()>;

    /// Write one document and return the identifier the store assigned
    fn index_document(&self, index: &str, document: &EmbeddedDocument) -> Result<String>;

    /// Make all written documents visible to search and count
    fn refresh(&self, index: &str) -> Result<()>;

    fn count(&self, index: &str) -> Result<usize>;

    fn search(&self, index: &str, query: &QuerySpec) -> Result<Vec<StoreHit>>;
}
