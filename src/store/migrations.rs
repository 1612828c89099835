// src/store/migrations.rs
//! Schema management for the SQLite document store

use sqlx::SqlitePool;
use tracing::{info, warn};

/// Create the document tables
///
/// Tables are only dropped when `reset` is set (RESET_DB=true), so restarts
/// keep their data.
pub async fn run_migrations(pool: &SqlitePool, reset: bool) -> Result<(), sqlx::Error> {
    if reset {
        warn!("RESET_DB=true - dropping document tables and recreating schema");
        sqlx::query("DROP TABLE IF EXISTS documents")
            .execute(pool)
            .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
        .execute(pool)
        .await?;

    info!("Document store schema ready");
    Ok(())
}
