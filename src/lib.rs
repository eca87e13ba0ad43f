use thiserror::Error;

pub type Result<T> = std::result::Result<T, FolktaleError>;

#[derive(Error, Debug)]
pub enum FolktaleError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index schema error: {0}")]
    IndexSchema(String),

    #[error("Store connection error: {0}")]
    StoreConnection(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report error: {0}")]
    Report(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod dataset;
pub mod document;
pub mod embeddings;
pub mod evaluation;
pub mod http;
pub mod indexer;
pub mod search;
pub mod store;
