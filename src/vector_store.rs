//! Vector store adapter.
//!
//! The only component that talks to the [`VectorDb`]. It embeds chunk text
//! on the way in, and translates the database's parallel-list result shapes
//! into [`Match`], [`StoredChunk`], and aggregate summaries on the way out.
//! Failures are classified as [`AssistantError::Embedding`] or
//! [`AssistantError::Store`] so callers can report them precisely.

use globset::Glob;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

use codebase_assistant_core::embedding::EmbeddingProvider;
use codebase_assistant_core::filter::{Filter, MetaField};
use codebase_assistant_core::models::{
    Chunk, DocumentSummary, FileSummary, Match, ProjectStats, StoredChunk,
};
use codebase_assistant_core::store::{Include, VectorDb, VectorRecord};

use crate::error::{AssistantError, Result};

/// Counts written by one [`VectorStore::upsert`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub ids: usize,
    pub metadatas: usize,
}

#[derive(Clone)]
pub struct VectorStore {
    db: Arc<dyn VectorDb>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorStore {
    pub fn new(db: Arc<dyn VectorDb>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, embedder }
    }

    /// Embed and write `chunks`, overwriting any record with the same id.
    pub async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertCounts> {
        if chunks.is_empty() {
            return Ok(UpsertCounts {
                ids: 0,
                metadatas: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .map_err(AssistantError::Embedding)?;
        if embeddings.len() != chunks.len() {
            return Err(AssistantError::Embedding(anyhow::anyhow!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(c, embedding)| VectorRecord {
                id: c.id.clone(),
                document: c.text.clone(),
                metadata: c.metadata.clone(),
                embedding,
            })
            .collect();

        self.db.upsert(&records).await.map_err(AssistantError::Store)?;

        Ok(UpsertCounts {
            ids: records.len(),
            metadatas: records.len(),
        })
    }

    /// Upsert one file's chunks, then drop the file's records that the new
    /// batch no longer covers (a file that shrank). All chunks must share
    /// `project_id` and `rel_path`. An embedding failure leaves the old
    /// records untouched.
    pub async fn replace_file(&self, chunks: &[Chunk]) -> Result<UpsertCounts> {
        let Some(first) = chunks.first() else {
            return self.upsert(chunks).await;
        };
        let counts = self.upsert(chunks).await?;

        let filter = Filter::project(&first.metadata.project_id).and(Filter::eq(
            MetaField::RelPath,
            first.metadata.rel_path.as_str(),
        ));
        let fresh: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let stale: Vec<String> = self
            .db
            .get(&filter, Include::NONE)
            .await
            .map_err(AssistantError::Store)?
            .ids
            .into_iter()
            .filter(|id| !fresh.contains(id.as_str()))
            .collect();
        if !stale.is_empty() {
            self.db.delete(&stale).await.map_err(AssistantError::Store)?;
            debug!(rel_path = %first.metadata.rel_path, stale = stale.len(), "dropped stale chunks");
        }
        Ok(counts)
    }

    /// Nearest-neighbour query, best match first. Documents and metadatas
    /// are always fetched; `include.distances` controls `Match::distance`.
    pub async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: &Filter,
        include: Include,
    ) -> Result<Vec<Match>> {
        let include = Include {
            documents: true,
            metadatas: true,
            distances: include.distances,
        };
        let res = self
            .db
            .query(embedding, top_k.max(1), filter, include)
            .await
            .map_err(AssistantError::Store)?;

        let documents = res.documents.unwrap_or_default();
        let metadatas = res.metadatas.unwrap_or_default();
        let distances = res.distances;

        Ok(documents
            .into_iter()
            .zip(metadatas)
            .enumerate()
            .map(|(i, (text, metadata))| Match {
                text,
                metadata,
                distance: distances.as_ref().and_then(|d| d.get(i).copied()),
            })
            .collect())
    }

    /// Delete every record matching `filter`; returns how many ids were
    /// resolved for deletion. The read and the delete are separate calls, so
    /// the count is an estimate under concurrent writes.
    pub async fn delete_where(&self, filter: &Filter) -> Result<usize> {
        let ids = self
            .db
            .get(filter, Include::NONE)
            .await
            .map_err(AssistantError::Store)?
            .ids;
        if ids.is_empty() {
            return Ok(0);
        }
        self.db.delete(&ids).await.map_err(AssistantError::Store)?;
        Ok(ids.len())
    }

    pub async fn stats(&self, project_id: &str) -> Result<ProjectStats> {
        let got = self
            .db
            .get(&Filter::project(project_id), Include::NONE)
            .await
            .map_err(AssistantError::Store)?;
        Ok(ProjectStats {
            project_id: project_id.to_string(),
            chunk_count: got.ids.len(),
        })
    }

    /// Distinct files of a project with chunk counts, sorted by `rel_path`,
    /// optionally narrowed by a shell-style glob over `rel_path`.
    pub async fn list_files(
        &self,
        project_id: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<FileSummary>> {
        let matcher = match pattern.filter(|p| !p.is_empty()) {
            Some(p) => Some(
                Glob::new(p)
                    .map_err(|e| {
                        AssistantError::InvalidInput(format!("invalid pattern '{}': {}", p, e))
                    })?
                    .compile_matcher(),
            ),
            None => None,
        };

        let metadatas = self
            .db
            .get(&Filter::project(project_id), Include::METADATAS)
            .await
            .map_err(AssistantError::Store)?
            .metadatas
            .unwrap_or_default();

        let mut files: BTreeMap<String, FileSummary> = BTreeMap::new();
        for m in metadatas {
            if let Some(matcher) = &matcher {
                if !matcher.is_match(&m.rel_path) {
                    continue;
                }
            }
            files
                .entry(m.rel_path.clone())
                .or_insert_with(|| FileSummary {
                    rel_path: m.rel_path.clone(),
                    filetype: m.filetype.clone(),
                    chunks: 0,
                })
                .chunks += 1;
        }

        Ok(files.into_values().collect())
    }

    /// Distinct documents of a project with chunk counts.
    pub async fn list_documents(&self, project_id: &str) -> Result<Vec<DocumentSummary>> {
        let metadatas = self
            .db
            .get(&Filter::project(project_id), Include::METADATAS)
            .await
            .map_err(AssistantError::Store)?
            .metadatas
            .unwrap_or_default();

        let mut docs: BTreeMap<String, DocumentSummary> = BTreeMap::new();
        for m in metadatas {
            docs.entry(m.doc_id.clone())
                .or_insert_with(|| DocumentSummary {
                    doc_id: m.doc_id.clone(),
                    source: m.source.clone(),
                    chunk_count: 0,
                })
                .chunk_count += 1;
        }

        let mut out: Vec<DocumentSummary> = docs.into_values().collect();
        out.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.doc_id.cmp(&b.doc_id)));
        Ok(out)
    }

    /// Up to `limit` chunks of a project, ordered by `(rel_path, chunk_idx)`.
    pub async fn get_chunks(
        &self,
        project_id: &str,
        rel_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        let mut filter = Filter::project(project_id);
        if let Some(rel) = rel_path.filter(|r| !r.is_empty()) {
            filter = filter.and(Filter::eq(MetaField::RelPath, rel));
        }

        let got = self
            .db
            .get(&filter, Include::ALL)
            .await
            .map_err(AssistantError::Store)?;

        let mut chunks: Vec<StoredChunk> = got
            .ids
            .into_iter()
            .zip(got.documents.unwrap_or_default())
            .zip(got.metadatas.unwrap_or_default())
            .map(|((id, text), metadata)| StoredChunk { id, text, metadata })
            .collect();
        chunks.sort_by(|a, b| {
            a.metadata
                .rel_path
                .cmp(&b.metadata.rel_path)
                .then(a.metadata.chunk_idx.cmp(&b.metadata.chunk_idx))
        });
        chunks.truncate(limit);
        Ok(chunks)
    }

    /// Every distinct `project_id` present in the collection.
    pub async fn project_ids(&self) -> Result<BTreeSet<String>> {
        let metadatas = self
            .db
            .get(&Filter::All, Include::METADATAS)
            .await
            .map_err(AssistantError::Store)?
            .metadatas
            .unwrap_or_default();
        Ok(metadatas.into_iter().map(|m| m.project_id).collect())
    }
}
