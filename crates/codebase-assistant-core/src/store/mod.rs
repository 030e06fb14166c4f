//! Vector-database contract.
//!
//! The [`VectorDb`] trait is the minimal surface the pipeline needs from a
//! vector engine: upsert records with precomputed embeddings, nearest-neighbour
//! query under a metadata [`Filter`], filtered get, and delete by id. One
//! instance represents one named collection.
//!
//! Backends: [`memory::InMemoryVectorDb`] here (tests), and the SQLite-backed
//! store in the app crate.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::filter::Filter;
use crate::models::ChunkMetadata;

/// One record to write: id, text, metadata, and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// Which optional fields a read should return. Ids are always returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Include {
    pub documents: bool,
    pub metadatas: bool,
    pub distances: bool,
}

impl Include {
    /// Documents, metadatas, and distances.
    pub const ALL: Include = Include {
        documents: true,
        metadatas: true,
        distances: true,
    };

    /// Ids only.
    pub const NONE: Include = Include {
        documents: false,
        metadatas: false,
        distances: false,
    };

    pub const METADATAS: Include = Include {
        documents: false,
        metadatas: true,
        distances: false,
    };
}

impl Default for Include {
    fn default() -> Self {
        Include::ALL
    }
}

/// Parallel, distance-ordered lists for a single query vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub documents: Option<Vec<String>>,
    pub metadatas: Option<Vec<ChunkMetadata>>,
    pub distances: Option<Vec<f32>>,
}

/// Parallel, unordered lists for a filtered get.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetResult {
    pub ids: Vec<String>,
    pub documents: Option<Vec<String>>,
    pub metadatas: Option<Vec<ChunkMetadata>>,
}

/// A single named collection of embedded records.
///
/// Implementations must be `Send + Sync`; upsert and delete must be
/// idempotent per id.
#[async_trait]
pub trait VectorDb: Send + Sync {
    /// Insert or overwrite records keyed by id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `n_results` records matching `filter`, ordered by
    /// ascending distance to `embedding`.
    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: &Filter,
        include: Include,
    ) -> Result<QueryResult>;

    /// Return every record matching `filter`, in no particular order.
    async fn get(&self, filter: &Filter, include: Include) -> Result<GetResult>;

    /// Delete records by id. Missing ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;
}
