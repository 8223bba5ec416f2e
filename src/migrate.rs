use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store).await?;

    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            author TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            version_id TEXT,
            level TEXT NOT NULL DEFAULT 'document',
            created_at INTEGER NOT NULL,
            last_access_at INTEGER NOT NULL,
            obsolete INTEGER NOT NULL DEFAULT 0,
            archived INTEGER NOT NULL DEFAULT 0,
            embedding BLOB NOT NULL,
            extra_json TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_version ON documents(doc_type, version_id)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_level ON documents(level)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_last_access ON documents(last_access_at)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
