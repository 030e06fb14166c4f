//! In-memory [`VectorDb`] implementation for tests.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Queries are
//! brute-force cosine distance over every record that passes the filter.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::filter::Filter;

use super::{GetResult, Include, QueryResult, VectorDb, VectorRecord};

/// In-memory collection keyed by record id.
#[derive(Default)]
pub struct InMemoryVectorDb {
    records: RwLock<BTreeMap<String, VectorRecord>>,
}

impl InMemoryVectorDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, VectorRecord>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("in-memory vector store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, VectorRecord>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory vector store lock poisoned"))
    }
}

#[async_trait]
impl VectorDb for InMemoryVectorDb {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.write()?;
        for r in records {
            stored.insert(r.id.clone(), r.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: &Filter,
        include: Include,
    ) -> Result<QueryResult> {
        let stored = self.read()?;
        let mut scored: Vec<(f32, &VectorRecord)> = stored
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| (cosine_distance(embedding, &r.embedding), r))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(n_results.max(1));

        Ok(QueryResult {
            ids: scored.iter().map(|(_, r)| r.id.clone()).collect(),
            documents: include
                .documents
                .then(|| scored.iter().map(|(_, r)| r.document.clone()).collect()),
            metadatas: include
                .metadatas
                .then(|| scored.iter().map(|(_, r)| r.metadata.clone()).collect()),
            distances: include
                .distances
                .then(|| scored.iter().map(|(d, _)| *d).collect()),
        })
    }

    async fn get(&self, filter: &Filter, include: Include) -> Result<GetResult> {
        let stored = self.read()?;
        let hits: Vec<&VectorRecord> = stored
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .collect();

        Ok(GetResult {
            ids: hits.iter().map(|r| r.id.clone()).collect(),
            documents: include
                .documents
                .then(|| hits.iter().map(|r| r.document.clone()).collect()),
            metadatas: include
                .metadatas
                .then(|| hits.iter().map(|r| r.metadata.clone()).collect()),
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut stored = self.write()?;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }
}
