
use tracing::debug;

use super::{ScoredHit, rank_hits, reject_blank_query};
use crate::config::LexicalConfig;
use crate::store::{DocumentStore, MoreLikeThisQuery, QuerySpec, TextField};
use crate::{FolktaleError, Result};

/// Term-overlap ranking delegated to the store's more-like-this query
pub struct LexicalBaseline<'a> {
    store: &'a dyn DocumentStore,
    index: String,
    config: LexicalConfig,
}

impl<'a> LexicalBaseline<'a> {
    #[inline]
    pub fn new(store: &'a dyn DocumentStore, index: impl Into<String>, config: LexicalConfig) -> Self {
        Self {
            store,
            index: index.into(),
            config,
        }
    }

    /// Search the configured fields
    #[inline]
    pub fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<ScoredHit>> {
        self.search_lexical(query_text, &self.config.fields, top_k)
    }

    #[inline]
    pub fn search_lexical(
        &self,
        query_text: &str,
        fields: &[TextField],
        top_k: usize,
    ) -> Result<Vec<ScoredHit>> {
        reject_blank_query(query_text)?;
        if fields.is_empty() {
            return Err(FolktaleError::Validation(
                "lexical search needs at least one field".to_string(),
            ));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let spec = QuerySpec::MoreLikeThis(MoreLikeThisQuery {
            like: query_text.to_string(),
            fields: fields.to_vec(),
            min_term_freq: self.config.min_term_freq,
            max_query_terms: self.config.max_query_terms,
            min_doc_freq: self.config.min_doc_freq,
            size: top_k,
        });

        let hits = self.store.search(&self.index, &spec)?;
        debug!("Lexical search for '{}' returned {} hits", query_text, hits.len());
        Ok(rank_hits(hits, top_k))
    }
}
