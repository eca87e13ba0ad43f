
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::Embedder;
use crate::{FolktaleError, Result};

/// Averages pretrained per-token vectors over whitespace-split tokens.
///
/// Tokens missing from the vocabulary are skipped. When no token is found,
/// including for empty text, the zero vector is returned instead of an error so
/// that a record with unseen vocabulary still gets indexed.
#[derive(Debug, Clone)]
pub struct TokenAverageEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl TokenAverageEmbedder {
    #[inline]
    pub fn new(dimension: usize, vectors: HashMap<String, Vec<f32>>) -> Result<Self> {
        if dimension == 0 {
            return Err(FolktaleError::Embedding(
                "word vector dimension must be positive".to_string(),
            ));
        }
        if let Some((token, vector)) = vectors.iter().find(|(_, v)| v.len() != dimension) {
            return Err(FolktaleError::Embedding(format!(
                "vector for '{}' has dimension {}, expected {}",
                token,
                vector.len(),
                dimension
            )));
        }
        Ok(Self { dimension, vectors })
    }

    /// Load vectors in word2vec text format.
    ///
    /// Each line is a token followed by its components. An optional
    /// `<count> <dimension>` header line is accepted; without one the dimension
    /// is taken from the first entry.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let embedder = Self::parse(&content)?;
        info!(
            "Loaded {} word vectors ({} dimensions) from {}",
            embedder.vocabulary_size(),
            embedder.dimension,
            path.display()
        );
        Ok(embedder)
    }

    #[inline]
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let mut declared = None;
        let mut vectors = HashMap::new();

        if let Some((_, first)) = lines.clone().next() {
            let fields: Vec<&str> = first.split_whitespace().collect();
            if let [count, dim] = fields.as_slice() {
                if let (Ok(_), Ok(dim)) = (count.parse::<usize>(), dim.parse::<usize>()) {
                    declared = Some(dim);
                    lines.next();
                }
            }
        }

        for (line_number, line) in lines {
            let mut fields = line.split_whitespace();
            let Some(token) = fields.next() else {
                continue;
            };
            let vector = fields
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| {
                    FolktaleError::Embedding(format!(
                        "invalid component on line {}: {}",
                        line_number + 1,
                        e
                    ))
                })?;

            let dimension = *declared.get_or_insert(vector.len());
            if vector.len() != dimension {
                return Err(FolktaleError::Embedding(format!(
                    "line {} has {} components, expected {}",
                    line_number + 1,
                    vector.len(),
                    dimension
                )));
            }
            vectors.insert(token.to_string(), vector);
        }

        let dimension = declared.ok_or_else(|| {
            FolktaleError::Embedding("word vector file contains no vectors".to_string())
        })?;
        Self::new(dimension, vectors)
    }

    #[inline]
    pub fn vocabulary_size(&self) -> usize {
        self.vectors.len()
    }
}

impl Embedder for TokenAverageEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut sum = vec![0.0_f32; self.dimension];
        let mut found = 0_usize;

        for token in text.split_whitespace() {
            if let Some(vector) = self.vectors.get(token) {
                for (acc, x) in sum.iter_mut().zip(vector) {
                    *acc += x;
                }
                found += 1;
            }
        }

        if found == 0 {
            debug!("No known tokens in input, returning zero vector");
            return Ok(sum);
        }

        let count = found as f32;
        for x in &mut sum {
            *x /= count;
        }
        Ok(sum)
    }
}
