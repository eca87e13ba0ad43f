
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{FolktaleError, Result};

const BUILTIN_FOLKTALES: &str = include_str!("../../data/folktales.json");

/// One folktale as read from the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolktaleRecord {
    pub name: String,
    pub story: String,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl FolktaleRecord {
    #[inline]
    pub fn new<N, S, I, A>(name: N, story: S, attributes: I) -> Self
    where
        N: Into<String>,
        S: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            name: name.into(),
            story: story.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Space-joined attribute list, the form used for embedding and composition
    #[inline]
    pub fn joined_attributes(&self) -> String {
        self.attributes.join(" ")
    }

    /// Reject records that cannot be embedded.
    ///
    /// Name and story must be non-blank. Attributes are an ordered set, so blank
    /// entries are an error and duplicates are reported.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FolktaleError::Validation(
                "record has an empty name".to_string(),
            ));
        }

        if self.story.trim().is_empty() {
            return Err(FolktaleError::Validation(format!(
                "record '{}' has an empty story",
                self.name
            )));
        }

        for (i, attribute) in self.attributes.iter().enumerate() {
            if attribute.trim().is_empty() {
                return Err(FolktaleError::Validation(format!(
                    "record '{}' has an empty attribute at position {}",
                    self.name, i
                )));
            }

            if self.attributes[..i].contains(attribute) {
                return Err(FolktaleError::Validation(format!(
                    "record '{}' lists attribute '{}' more than once",
                    self.name, attribute
                )));
            }
        }

        Ok(())
    }
}

/// Validate every record, naming the first offender by position
#[inline]
pub fn validate_records(records: &[FolktaleRecord]) -> Result<()> {
    for (i, record) in records.iter().enumerate() {
        record.validate().map_err(|e| match e {
            FolktaleError::Validation(msg) => {
                FolktaleError::Validation(format!("dataset entry {}: {}", i, msg))
            }
            other => other,
        })?;
    }

    let mut names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    names.sort_unstable();
    if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
        warn!("Dataset contains duplicate name '{}'", pair[0]);
    }

    Ok(())
}

/// Parse a JSON array of records
#[inline]
pub fn parse_records(json: &str) -> Result<Vec<FolktaleRecord>> {
    let records: Vec<FolktaleRecord> = serde_json::from_str(json)
        .map_err(|e| FolktaleError::Validation(format!("malformed dataset: {}", e)))?;
    validate_records(&records)?;
    Ok(records)
}

/// Load and validate a JSON dataset file
#[inline]
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<FolktaleRecord>> {
    let path = path.as_ref();
    debug!("Loading dataset from {}", path.display());

    let content = fs::read_to_string(path)?;
    let records = parse_records(&content).map_err(|e| match e {
        FolktaleError::Validation(msg) => {
            FolktaleError::Validation(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;

    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// The sample corpus shipped with the crate
#[inline]
pub fn builtin_folktales() -> Result<Vec<FolktaleRecord>> {
    parse_records(BUILTIN_FOLKTALES)
}
