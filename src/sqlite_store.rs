//! SQLite-backed [`VectorDb`] implementation.
//!
//! One table holds every collection's records; each [`SqliteVectorDb`]
//! is bound to a single collection name. Embeddings are stored as
//! little-endian `f32` BLOBs and nearest-neighbour search is a brute-force
//! cosine-distance scan over the rows that pass the metadata filter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::warn;

use codebase_assistant_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use codebase_assistant_core::filter::{Filter, FilterValue, MetaField};
use codebase_assistant_core::models::ChunkMetadata;
use codebase_assistant_core::store::{GetResult, Include, QueryResult, VectorDb, VectorRecord};

use crate::{db, migrate};

pub struct SqliteVectorDb {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorDb {
    /// Open the database at `path` and get-or-create `collection`.
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        let pool = db::connect(path).await?;
        Self::from_pool(pool, collection).await
    }

    pub async fn from_pool(pool: SqlitePool, collection: &str) -> Result<Self> {
        migrate::run_migrations(&pool).await?;

        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(collection)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&pool)
            .await
            .with_context(|| format!("Failed to create collection '{}'", collection))?;

        Ok(Self {
            pool,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// SQL fragment plus positional bind values for a [`Filter`].
fn filter_sql(filter: &Filter, binds: &mut Vec<FilterValue>) -> String {
    match filter {
        Filter::All => "1 = 1".to_string(),
        Filter::And(parts) if parts.is_empty() => "1 = 1".to_string(),
        Filter::And(parts) => {
            let clauses: Vec<String> = parts.iter().map(|p| filter_sql(p, binds)).collect();
            format!("({})", clauses.join(" AND "))
        }
        Filter::Eq { field, value } => {
            binds.push(value.clone());
            match field {
                MetaField::ProjectId => "project_id = ?".to_string(),
                MetaField::RelPath => "rel_path = ?".to_string(),
                other => format!("json_extract(metadata_json, '$.{}') = ?", other.as_str()),
            }
        }
    }
}

fn parse_metadata(row: &SqliteRow) -> Result<ChunkMetadata> {
    let raw: String = row.get("metadata_json");
    let id: String = row.get("id");
    serde_json::from_str(&raw).with_context(|| format!("Corrupt metadata for record '{}'", id))
}

impl SqliteVectorDb {
    async fn fetch_filtered(&self, columns: &str, filter: &Filter) -> Result<Vec<SqliteRow>> {
        let mut binds = Vec::new();
        let where_sql = filter_sql(filter, &mut binds);
        let sql = format!(
            "SELECT {} FROM vectors WHERE collection = ? AND {}",
            columns, where_sql
        );

        let mut q = sqlx::query(&sql).bind(&self.collection);
        for value in binds {
            q = match value {
                FilterValue::Text(s) => q.bind(s),
                FilterValue::Int(n) => q.bind(n),
            };
        }
        Ok(q.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl VectorDb for SqliteVectorDb {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for r in records {
            let metadata_json = serde_json::to_string(&r.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO vectors (collection, id, document, metadata_json,
                                     project_id, rel_path, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    metadata_json = excluded.metadata_json,
                    project_id = excluded.project_id,
                    rel_path = excluded.rel_path,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&r.id)
            .bind(&r.document)
            .bind(&metadata_json)
            .bind(&r.metadata.project_id)
            .bind(&r.metadata.rel_path)
            .bind(vec_to_blob(&r.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: &Filter,
        include: Include,
    ) -> Result<QueryResult> {
        let rows = self
            .fetch_filtered("id, document, metadata_json, embedding", filter)
            .await?;

        let mut mismatched = 0usize;
        let mut scored: Vec<(f32, &SqliteRow)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let distance = distance_to(embedding, &blob).unwrap_or_else(|| {
                    mismatched += 1;
                    1.0
                });
                (distance, row)
            })
            .collect();
        if mismatched > 0 {
            warn!(
                collection = %self.collection,
                mismatched,
                query_dims = embedding.len(),
                "stored embeddings differ in dimension from the query; re-embed the affected projects"
            );
        }
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(n_results.max(1));

        let mut result = QueryResult {
            ids: scored.iter().map(|(_, r)| r.get("id")).collect(),
            ..Default::default()
        };
        if include.documents {
            result.documents = Some(scored.iter().map(|(_, r)| r.get("document")).collect());
        }
        if include.metadatas {
            result.metadatas = Some(
                scored
                    .iter()
                    .map(|(_, r)| parse_metadata(r))
                    .collect::<Result<_>>()?,
            );
        }
        if include.distances {
            result.distances = Some(scored.iter().map(|(d, _)| *d).collect());
        }
        Ok(result)
    }

    async fn get(&self, filter: &Filter, include: Include) -> Result<GetResult> {
        let rows = self
            .fetch_filtered("id, document, metadata_json", filter)
            .await?;

        let mut result = GetResult {
            ids: rows.iter().map(|r| r.get("id")).collect(),
            ..Default::default()
        };
        if include.documents {
            result.documents = Some(rows.iter().map(|r| r.get("document")).collect());
        }
        if include.metadatas {
            result.metadatas = Some(rows.iter().map(parse_metadata).collect::<Result<_>>()?);
        }
        Ok(result)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM vectors WHERE collection = ? AND id = ?")
                .bind(&self.collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Cosine distance between `query` and a stored BLOB, or `None` when the
/// stored vector has a different dimension.
fn distance_to(query: &[f32], blob: &[u8]) -> Option<f32> {
    let stored = blob_to_vec(blob);
    (stored.len() == query.len()).then(|| cosine_distance(query, &stored))
}
