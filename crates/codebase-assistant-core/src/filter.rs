//! Typed metadata filters for vector-store reads and deletes.
//!
//! A [`Filter`] is either "match everything", an equality predicate on a
//! single [`ChunkMetadata`] field, or a conjunction of filters. Backends
//! either evaluate it directly via [`Filter::matches`] (in-memory) or
//! translate it into their own query language (SQLite `json_extract`).

use serde::{Deserialize, Serialize};

use crate::models::ChunkMetadata;

/// Metadata fields that filters may test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaField {
    ProjectId,
    DocId,
    RelPath,
    Source,
    Filetype,
    ChunkIdx,
}

impl MetaField {
    /// The metadata key as stored in the serialized metadata object.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaField::ProjectId => "project_id",
            MetaField::DocId => "doc_id",
            MetaField::RelPath => "rel_path",
            MetaField::Source => "source",
            MetaField::Filetype => "filetype",
            MetaField::ChunkIdx => "chunk_idx",
        }
    }
}

/// Right-hand side of an equality predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Int(i64),
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Text(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Text(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Int(n)
    }
}

/// A metadata predicate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every record.
    #[default]
    All,
    Eq { field: MetaField, value: FilterValue },
    /// Matches when every inner filter matches. An empty list matches all.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: MetaField, value: impl Into<FilterValue>) -> Self {
        Filter::Eq {
            field,
            value: value.into(),
        }
    }

    /// Shorthand for `project_id == id`.
    pub fn project(project_id: &str) -> Self {
        Filter::eq(MetaField::ProjectId, project_id)
    }

    /// Combine two filters, flattening nested conjunctions and dropping `All`.
    pub fn and(self, other: Filter) -> Filter {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Filter::All => {}
                Filter::And(inner) => parts.extend(inner),
                eq => parts.push(eq),
            }
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    /// Evaluate the filter against one record's metadata.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match self {
            Filter::All => true,
            Filter::And(parts) => parts.iter().all(|f| f.matches(metadata)),
            Filter::Eq { field, value } => match (field, value) {
                (MetaField::ChunkIdx, FilterValue::Int(n)) => {
                    i64::try_from(metadata.chunk_idx).is_ok_and(|idx| idx == *n)
                }
                (MetaField::ChunkIdx, FilterValue::Text(_)) => false,
                (_, FilterValue::Int(_)) => false,
                (field, FilterValue::Text(s)) => text_field(metadata, *field) == Some(s.as_str()),
            },
        }
    }
}

fn text_field(metadata: &ChunkMetadata, field: MetaField) -> Option<&str> {
    match field {
        MetaField::ProjectId => Some(&metadata.project_id),
        MetaField::DocId => Some(&metadata.doc_id),
        MetaField::RelPath => Some(&metadata.rel_path),
        MetaField::Source => Some(&metadata.source),
        MetaField::Filetype => Some(&metadata.filetype),
        MetaField::ChunkIdx => None,
    }
}
