
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::FolktaleRecord;
use crate::embeddings::{Embedder, check_dimension};
use crate::{FolktaleError, Result};

/// A dense-vector field of an indexed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorField {
    Name,
    Story,
    Attributes,
}

impl VectorField {
    pub const ALL: [Self; 3] = [Self::Name, Self::Story, Self::Attributes];

    /// Property name in the stored document
    #[inline]
    pub const fn property(self) -> &'static str {
        match self {
            Self::Name => "name_vector",
            Self::Story => "story_vector",
            Self::Attributes => "attributes_vector",
        }
    }

    /// Short name used for weights and messages
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Story => "story",
            Self::Attributes => "attributes",
        }
    }
}

impl fmt::Display for VectorField {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which text feeds which vector field.
///
/// `StoryWithAttributes` folds the attribute list into the story vector so that
/// attributes influence ranking without a dedicated field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldComposition {
    /// Title → `name_vector`, story → `story_vector`
    Separate,
    /// Title → `name_vector`, story + joined attributes → `story_vector`
    #[default]
    StoryWithAttributes,
    /// Title, story and joined attributes each get their own vector
    SeparateWithAttributes,
}

impl FieldComposition {
    #[inline]
    pub const fn vector_fields(self) -> &'static [VectorField] {
        match self {
            Self::Separate | Self::StoryWithAttributes => &[VectorField::Name, VectorField::Story],
            Self::SeparateWithAttributes => &VectorField::ALL,
        }
    }

    #[inline]
    pub const fn has_attributes_vector(self) -> bool {
        matches!(self, Self::SeparateWithAttributes)
    }

    /// Texts to embed for `record`, in [`Self::vector_fields`] order
    #[inline]
    pub fn field_texts(self, record: &FolktaleRecord) -> Vec<(VectorField, String)> {
        let story = match self {
            Self::StoryWithAttributes if !record.attributes.is_empty() => {
                format!("{} {}", record.story, record.joined_attributes())
            }
            _ => record.story.clone(),
        };

        let mut texts = vec![
            (VectorField::Name, record.name.clone()),
            (VectorField::Story, story),
        ];
        if self.has_attributes_vector() {
            texts.push((VectorField::Attributes, record.joined_attributes()));
        }
        texts
    }
}

impl fmt::Display for FieldComposition {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Separate => "separate",
            Self::StoryWithAttributes => "story_with_attributes",
            Self::SeparateWithAttributes => "separate_with_attributes",
        })
    }
}

/// A folktale together with its field vectors, as written to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    pub name: String,
    pub story: String,
    pub attributes: Vec<String>,
    pub name_vector: Vec<f32>,
    pub story_vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_vector: Option<Vec<f32>>,
}

impl EmbeddedDocument {
    #[inline]
    pub fn vector(&self, field: VectorField) -> Option<&[f32]> {
        match field {
            VectorField::Name => Some(&self.name_vector),
            VectorField::Story => Some(&self.story_vector),
            VectorField::Attributes => self.attributes_vector.as_deref(),
        }
    }
}

/// Embed every field `composition` asks for.
///
/// Errors name the document, and the field when the failure is attributable to
/// one (dimension mismatch).
#[inline]
pub fn embed_record(
    record: &FolktaleRecord,
    embedder: &dyn Embedder,
    composition: FieldComposition,
) -> Result<EmbeddedDocument> {
    let (fields, texts): (Vec<VectorField>, Vec<String>) =
        composition.field_texts(record).into_iter().unzip();

    if texts.iter().any(|t| t.trim().is_empty()) {
        let field = fields
            .iter()
            .zip(&texts)
            .find(|(_, t)| t.trim().is_empty())
            .map_or("unknown", |(f, _)| f.label());
        return Err(FolktaleError::Embedding(format!(
            "document '{}': field '{}' has no text to embed",
            record.name, field
        )));
    }

    let vectors = embedder.embed_batch(&texts).map_err(|e| {
        let labels: Vec<&str> = fields.iter().map(|f| f.label()).collect();
        FolktaleError::Embedding(format!(
            "document '{}' (fields: {}): {}",
            record.name,
            labels.join(", "),
            e
        ))
    })?;

    if vectors.len() != fields.len() {
        return Err(FolktaleError::Embedding(format!(
            "document '{}': expected {} vectors, got {}",
            record.name,
            fields.len(),
            vectors.len()
        )));
    }

    let mut document = EmbeddedDocument {
        name: record.name.clone(),
        story: record.story.clone(),
        attributes: record.attributes.clone(),
        name_vector: Vec::new(),
        story_vector: Vec::new(),
        attributes_vector: None,
    };

    for (field, vector) in fields.into_iter().zip(vectors) {
        check_dimension(embedder.dimension(), &vector).map_err(|e| {
            FolktaleError::Embedding(format!(
                "document '{}', field '{}': {}",
                record.name, field, e
            ))
        })?;
        match field {
            VectorField::Name => document.name_vector = vector,
            VectorField::Story => document.story_vector = vector,
            VectorField::Attributes => document.attributes_vector = Some(vector),
        }
    }

    debug!("Embedded '{}' with composition {}", record.name, composition);
    Ok(document)
}
