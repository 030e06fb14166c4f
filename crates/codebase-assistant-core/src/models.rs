//! Core data models for the chunking and retrieval pipeline.
//!
//! These are the wire shapes exchanged between the ingestion orchestrator,
//! the vector store adapter, and the retrieval orchestrator, and they are
//! serialized as-is by the HTTP API.

use serde::{Deserialize, Serialize};

/// Project id used when a chunk is built without an explicit project.
pub const DEFAULT_PROJECT_ID: &str = "default";

/// Project name used when a chunk is built without an explicit project.
pub const DEFAULT_PROJECT_NAME: &str = "Unnamed Project";

/// Provenance and identity metadata attached to every stored chunk.
///
/// Produced by exactly one writer (the metadata builder), so readers can
/// rely on every field being present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Stable per-file id (UUIDv5 of the absolute path).
    pub doc_id: String,
    /// File basename.
    pub source: String,
    /// 0-based position of the chunk within its file.
    pub chunk_idx: usize,
    pub project_id: String,
    pub project_name: String,
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub abs_path: String,
    pub rel_path: String,
    /// File extension including the leading dot (`".py"`), or empty.
    pub filetype: String,
    pub size_bytes: u64,
    /// Last modification time, ISO-8601.
    pub mtime: String,
}

/// A contiguous span of a file's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{project_id}::{rel_path}::{chunk_idx}"`, deterministic across re-ingestion.
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Compose the deterministic chunk id.
    pub fn make_id(project_id: &str, rel_path: &str, chunk_idx: usize) -> String {
        format!("{}::{}::{}", project_id, rel_path, chunk_idx)
    }
}

/// One retrieval result, ordered by ascending distance within a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Lower is more similar. Absent when distances were not requested.
    pub distance: Option<f32>,
}

/// A logical grouping of chunks, persisted in the project registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub project_name: String,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    pub created_at: String,
}

/// Chunk count for one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    pub project_id: String,
    pub chunk_count: usize,
}

/// Per-file aggregate returned by `list_files`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub rel_path: String,
    pub filetype: String,
    pub chunks: usize,
}

/// Per-document aggregate returned by `list_documents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub source: String,
    pub chunk_count: usize,
}

/// A stored chunk as read back from the vector store (no embedding).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}
