
use std::ops::RangeInclusive;

use super::Embedder;
use crate::{FolktaleError, Result};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Feature-hashing embedder over character n-grams.
///
/// Every whitespace-separated segment contributes its character n-grams for each
/// size in the configured range. An n-gram is hashed with 64-bit FNV-1a; the low
/// bits pick a bucket and the top bit picks the sign. The result is L2-normalised.
/// Works without a tokenizer, which suits scripts like Japanese that do not mark
/// word boundaries.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    ngram_sizes: RangeInclusive<usize>,
}

impl HashEmbedder {
    #[inline]
    pub fn new(dimension: usize, ngram_sizes: RangeInclusive<usize>) -> Result<Self> {
        if dimension == 0 {
            return Err(FolktaleError::Embedding(
                "hash embedder dimension must be positive".to_string(),
            ));
        }
        if *ngram_sizes.start() == 0 || ngram_sizes.is_empty() {
            return Err(FolktaleError::Embedding(format!(
                "invalid n-gram range {}..={}",
                ngram_sizes.start(),
                ngram_sizes.end()
            )));
        }
        Ok(Self {
            dimension,
            ngram_sizes,
        })
    }

    fn accumulate(&self, segment: &str, vector: &mut [f32]) {
        let chars: Vec<char> = segment.chars().collect();
        let mut buf = String::new();

        for n in self.ngram_sizes.clone() {
            for window in chars.windows(n) {
                buf.clear();
                buf.extend(window);
                let hash = fnv1a(buf.as_bytes());
                let bucket = (hash % self.dimension as u64) as usize;
                let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
                vector[bucket] += sign;
            }
        }
    }
}

impl Embedder for HashEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(FolktaleError::Embedding(
                "cannot embed empty text".to_string(),
            ));
        }

        let mut vector = vec![0.0_f32; self.dimension];
        for segment in text.split_whitespace() {
            self.accumulate(segment, &mut vector);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
