use anyhow::Result;
use sqlx::SqlitePool;

/// Create the vector-store schema. Safe to run on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // project_id and rel_path are denormalised out of metadata_json so the
    // common project-scoped filters can use an index.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            document TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            project_id TEXT NOT NULL,
            rel_path TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vectors_project ON vectors(collection, project_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vectors_rel_path ON vectors(collection, project_id, rel_path)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
