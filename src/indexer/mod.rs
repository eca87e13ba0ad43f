// Indexer module
// Drops, recreates and fills the folktale index


use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::dataset::{FolktaleRecord, validate_records};
use crate::document::{FieldComposition, embed_record};
use crate::embeddings::Embedder;
use crate::store::{DocumentStore, IndexSchema};
use crate::{FolktaleError, Result};

/// Outcome of a rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub index: String,
    pub ids: Vec<String>,
    pub document_count: usize,
}

/// Owns the lifecycle of one index: schema, recreation and document writes.
///
/// Every document is embedded with the same embedder and composition, so the
/// schema's vector fields and dimension always match what gets written.
pub struct IndexManager<'a> {
    store: &'a dyn DocumentStore,
    embedder: &'a dyn Embedder,
    composition: FieldComposition,
    schema: IndexSchema,
}

impl<'a> IndexManager<'a> {
    #[inline]
    pub fn new(
        store: &'a dyn DocumentStore,
        embedder: &'a dyn Embedder,
        composition: FieldComposition,
    ) -> Self {
        let schema = IndexSchema::new(composition, embedder.dimension());
        Self {
            store,
            embedder,
            composition,
            schema,
        }
    }

    #[inline]
    pub const fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    #[inline]
    pub const fn composition(&self) -> FieldComposition {
        self.composition
    }

    /// Delete `name` if it exists, then create it empty with this manager's schema
    #[inline]
    pub fn create_index(&self, name: &str) -> Result<()> {
        if self.store.index_exists(name)? {
            info!("Deleting existing index {}", name);
            self.store.delete_index(name)?;
        }
        self.store.create_index(name, &self.schema)?;
        info!(
            "Created index {} ({} vector fields, dimension {})",
            name,
            self.schema.vector_fields.len(),
            self.schema.dimension
        );
        Ok(())
    }

    /// Embed and write every record, returning the store-assigned ids in input order.
    ///
    /// The whole batch is validated before anything is written. A failure part
    /// way through leaves the documents already written in place and reports
    /// how many there were.
    #[inline]
    pub fn index_documents(&self, name: &str, records: &[FolktaleRecord]) -> Result<Vec<String>> {
        validate_records(records)?;

        let bar = progress_bar(records.len());
        let mut ids = Vec::with_capacity(records.len());

        for record in records {
            bar.set_message(record.name.clone());
            let written = self.index_one(name, record);
            match written {
                Ok(id) => {
                    debug!("Indexed '{}' as {}", record.name, id);
                    ids.push(id);
                    bar.inc(1);
                }
                Err(e) => {
                    bar.abandon();
                    warn!(
                        "Indexing stopped at '{}' after {} of {} documents",
                        record.name,
                        ids.len(),
                        records.len()
                    );
                    return Err(with_progress(e, &record.name, ids.len(), records.len()));
                }
            }
        }

        bar.finish_and_clear();
        self.store.refresh(name)?;
        info!("Indexed {} documents into {}", ids.len(), name);
        Ok(ids)
    }

    fn index_one(&self, name: &str, record: &FolktaleRecord) -> Result<String> {
        let document = embed_record(record, self.embedder, self.composition)?;
        self.schema.validate_document(&document)?;
        self.store.index_document(name, &document)
    }

    /// Recreate `name` and fill it with `records`
    #[inline]
    pub fn rebuild(&self, name: &str, records: &[FolktaleRecord]) -> Result<IndexingStats> {
        validate_records(records)?;
        self.create_index(name)?;
        let ids = self.index_documents(name, records)?;
        let document_count = self.document_count(name)?;
        Ok(IndexingStats {
            index: name.to_string(),
            ids,
            document_count,
        })
    }

    #[inline]
    pub fn document_count(&self, name: &str) -> Result<usize> {
        self.store.count(name)
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{bar:30} [{pos}/{len}] Embedding {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len as u64).with_style(style)
}

fn with_progress(error: FolktaleError, document: &str, written: usize, total: usize) -> FolktaleError {
    let context = format!("indexed {} of {} before '{}'", written, total, document);
    match error {
        FolktaleError::Embedding(msg) => FolktaleError::Embedding(format!("{}: {}", context, msg)),
        FolktaleError::IndexSchema(msg) => {
            FolktaleError::IndexSchema(format!("{}: {}", context, msg))
        }
        FolktaleError::StoreConnection(msg) => {
            FolktaleError::StoreConnection(format!("{}: {}", context, msg))
        }
        FolktaleError::Store(msg) => FolktaleError::Store(format!("{}: {}", context, msg)),
        other => other,
    }
}
