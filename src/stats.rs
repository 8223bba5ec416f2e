//! Store statistics and health overview.
//!
//! Provides a quick summary of the store: document counts per level,
//! lifecycle-flag counts, and on-disk size. Used by `ctxmem stats` to give
//! confidence that saves, rollups, and compaction are working as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::embedding;

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;

    let level_rows = sqlx::query(
        "SELECT level, COUNT(*) AS doc_count FROM documents GROUP BY level ORDER BY level",
    )
    .fetch_all(&pool)
    .await?;

    let obsolete_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE obsolete = 1")
            .fetch_one(&pool)
            .await?;

    let archived_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE archived = 1")
            .fetch_one(&pool)
            .await?;

    let store_bytes: u64 = walkdir::WalkDir::new(&config.store.path)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum();

    let provider = embedding::create_provider(&config.embedding)?;

    println!("Context Memory — Store Stats");
    println!("============================");
    println!();
    println!("  Store:       {}", config.store.path.display());
    println!("  Size:        {}", format_bytes(store_bytes));
    println!("  Embedding:   {}", provider.model_name());
    println!();
    println!("  Documents:   {}", total_docs);
    for row in &level_rows {
        let level: String = row.get("level");
        let count: i64 = row.get("doc_count");
        println!("    {:<10} {}", format!("{}:", level), count);
    }
    println!("  Obsolete:    {}", obsolete_count);
    println!("  Archived:    {}", archived_count);
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
