//! SQLite-backed [`VectorIndex`].
//!
//! Records live in a single `documents` table with the embedding stored as
//! a little-endian f32 BLOB. Nearest-neighbor queries fetch the candidate
//! rows under the metadata filter and compute cosine similarity in
//! process; store sizes here make a brute-force scan the honest choice.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{merge_extra, DocLevel, DocumentRecord};

use super::{DocFilter, MetadataPatch, Neighbor, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
    root: PathBuf,
}

impl SqliteIndex {
    /// Wrap an open pool. `root` is the persistence directory whose byte
    /// size backs [`VectorIndex::storage_bytes`].
    pub fn new(pool: SqlitePool, root: PathBuf) -> Self {
        Self { pool, root }
    }
}

const RECORD_COLUMNS: &str = "id, content, author, doc_type, version_id, level, \
     created_at, last_access_at, obsolete, archived, embedding, extra_json";

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentRecord> {
    let level_str: String = row.get("level");
    let level = DocLevel::parse(&level_str)
        .with_context(|| format!("unknown document level in index: '{}'", level_str))?;

    let extra_json: String = row.get("extra_json");
    let extra: serde_json::Value =
        serde_json::from_str(&extra_json).unwrap_or(serde_json::json!({}));

    let blob: Vec<u8> = row.get("embedding");

    Ok(DocumentRecord {
        id: row.get("id"),
        content: row.get("content"),
        author: row.get("author"),
        doc_type: row.get("doc_type"),
        version_id: row.get("version_id"),
        level,
        created_at: row.get("created_at"),
        last_access_at: row.get("last_access_at"),
        obsolete: row.get::<i64, _>("obsolete") != 0,
        archived: row.get::<i64, _>("archived") != 0,
        embedding: blob_to_vec(&blob),
        extra,
    })
}

/// Render a filter as SQL conditions. String predicates come back as bind
/// values; numeric and boolean predicates are inlined.
fn filter_sql(filter: &DocFilter) -> (String, Vec<String>) {
    let mut conds: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(level) = filter.level {
        conds.push("level = ?".to_string());
        binds.push(level.as_str().to_string());
    }
    if let Some(obsolete) = filter.obsolete {
        conds.push(format!("obsolete = {}", obsolete as i64));
    }
    if let Some(archived) = filter.archived {
        conds.push(format!("archived = {}", archived as i64));
    }
    if let Some(ref doc_type) = filter.doc_type {
        conds.push("doc_type = ?".to_string());
        binds.push(doc_type.clone());
    }
    if let Some(ref version_id) = filter.version_id {
        conds.push("version_id = ?".to_string());
        binds.push(version_id.clone());
    }
    if let Some(cutoff) = filter.last_access_before {
        conds.push(format!("last_access_at < {}", cutoff));
    }

    let clause = if conds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conds.join(" AND "))
    };
    (clause, binds)
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, content, author, doc_type, version_id, level, created_at, last_access_at, obsolete, archived, embedding, extra_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                author = excluded.author,
                doc_type = excluded.doc_type,
                version_id = excluded.version_id,
                level = excluded.level,
                last_access_at = excluded.last_access_at,
                obsolete = excluded.obsolete,
                archived = excluded.archived,
                extra_json = excluded.extra_json
            "#,
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(&record.author)
        .bind(&record.doc_type)
        .bind(&record.version_id)
        .bind(record.level.as_str())
        .bind(record.created_at)
        .bind(record.last_access_at)
        .bind(record.obsolete as i64)
        .bind(record.archived as i64)
        .bind(vec_to_blob(&record.embedding))
        .bind(record.extra.to_string())
        .execute(&self.pool)
        .await
        .context("failed to upsert document")?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()> {
        let mut sets: Vec<String> = Vec::new();
        if let Some(obsolete) = patch.obsolete {
            sets.push(format!("obsolete = {}", obsolete as i64));
        }
        if let Some(archived) = patch.archived {
            sets.push(format!("archived = {}", archived as i64));
        }
        if let Some(ts) = patch.last_access_at {
            sets.push(format!("last_access_at = {}", ts));
        }
        if sets.is_empty() {
            return Ok(());
        }

        let sql = format!("UPDATE documents SET {} WHERE id = ?", sets.join(", "));
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn replace_content(&self, id: &str, content: &str, extra_merge: &serde_json::Value) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT extra_json FROM documents WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(extra_json) = existing else {
            tx.commit().await?;
            return Ok(());
        };

        let mut extra: serde_json::Value =
            serde_json::from_str(&extra_json).unwrap_or(serde_json::json!({}));
        merge_extra(&mut extra, extra_merge);

        sqlx::query("UPDATE documents SET content = ?, extra_json = ? WHERE id = ?")
            .bind(content)
            .bind(extra.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize, filter: &DocFilter) -> Result<Vec<Neighbor>> {
        let candidates = self.list(filter).await?;

        let mut neighbors: Vec<Neighbor> = candidates
            .into_iter()
            .map(|record| {
                let similarity = cosine_similarity(vector, &record.embedding) as f64;
                Neighbor {
                    record,
                    distance: 1.0 - similarity,
                }
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }

    async fn list(&self, filter: &DocFilter) -> Result<Vec<DocumentRecord>> {
        let (clause, binds) = filter_sql(filter);
        let sql = format!("SELECT {} FROM documents{}", RECORD_COLUMNS, clause);

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn storage_bytes(&self) -> Result<u64> {
        let mut total = 0u64;
        for entry in walkdir::WalkDir::new(&self.root).into_iter().flatten() {
            if entry.file_type().is_file() {
                if let Ok(meta) = entry.metadata() {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }

    async fn compact(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}
