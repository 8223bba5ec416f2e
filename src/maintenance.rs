//! Maintenance policies that keep the store bounded.
//!
//! Two independent operations with different cadences:
//!
//! - [`check_and_maintain`] runs after every save and triggers a rollup
//!   once the document-count or size ceiling is exceeded.
//! - [`periodic_compaction`] is meant for a cron-like schedule: once the
//!   store outgrows its compaction ceiling, the least-recently-used half
//!   of the stale documents is condensed in place and archived, and the
//!   index is compacted.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use crate::config::Config;
use crate::index::{DocFilter, MetadataPatch};
use crate::models::{CompactionStats, DocLevel};
use crate::rollup;
use crate::store::MemoryStore;
use crate::summary::summarize_extractive;

const MB: f64 = 1024.0 * 1024.0;

/// Token budget of the condensed body left behind by compaction.
const COMPACTED_SUMMARY_TOKENS: usize = 64;

/// Post-save budget check. Exceeding the document-count or size ceiling
/// triggers a rollup; returns the number of summaries it created.
pub async fn check_and_maintain(store: &MemoryStore, now: i64) -> Result<usize> {
    let config = store.maintenance_config();

    let count = store.index().count().await?;
    let size_mb = store.index().storage_bytes().await? as f64 / MB;

    if count > config.max_documents || size_mb > config.max_size_mb {
        rollup::roll_up(store, now).await
    } else {
        Ok(0)
    }
}

/// Scheduled compaction pass over stale, rarely-accessed documents.
///
/// No-op while the store is at or under `compaction_size_mb`. Otherwise
/// the least-recently-used half of the documents untouched for
/// `stale_after_days` gets its content replaced by a 64-token summary
/// (original length recorded in extra metadata, embedding untouched) and
/// is archived. The index is compacted once per run.
pub async fn periodic_compaction(store: &MemoryStore, now: i64) -> Result<CompactionStats> {
    let config = store.maintenance_config();

    let mut stats = CompactionStats {
        size_before_mb: store.index().storage_bytes().await? as f64 / MB,
        ..CompactionStats::default()
    };
    stats.size_after_mb = stats.size_before_mb;

    if stats.size_before_mb <= config.compaction_size_mb {
        return Ok(stats);
    }

    let cutoff = now - config.stale_after_days * 86_400;
    let mut stale = store
        .index()
        .list(&DocFilter {
            last_access_before: Some(cutoff),
            ..DocFilter::live(DocLevel::Document)
        })
        .await?;

    stale.sort_by(|a, b| {
        a.last_access_at
            .cmp(&b.last_access_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    let lru_half = stale.len() / 2;

    for doc in stale.into_iter().take(lru_half) {
        let condensed = summarize_extractive(&doc.content, COMPACTED_SUMMARY_TOKENS);
        let merge = json!({
            "original_length": doc.content.chars().count(),
            "resummarized": true,
        });
        store
            .index()
            .replace_content(&doc.id, &condensed, &merge)
            .await?;
        store
            .index()
            .update_metadata(
                &doc.id,
                &MetadataPatch {
                    archived: Some(true),
                    ..MetadataPatch::default()
                },
            )
            .await?;

        stats.processed += 1;
        stats.archived += 1;
    }

    store.index().compact().await?;
    stats.size_after_mb = store.index().storage_bytes().await? as f64 / MB;

    Ok(stats)
}

/// CLI entry point for `ctxmem compact`.
pub async fn run_compact(config: &Config) -> Result<()> {
    let store = MemoryStore::open(config).await?;
    let stats = periodic_compaction(&store, Utc::now().timestamp()).await?;

    println!("compaction");
    println!("  processed: {}", stats.processed);
    println!("  archived: {}", stats.archived);
    println!("  size before: {:.2} MB", stats.size_before_mb);
    println!("  size after: {:.2} MB", stats.size_after_mb);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, MaintenanceConfig};
    use crate::index::InMemoryIndex;
    use crate::models::NewDocument;

    fn store_with(maintenance: MaintenanceConfig) -> MemoryStore {
        MemoryStore::new(
            Box::new(InMemoryIndex::new()),
            EmbeddingConfig::default(),
            maintenance,
        )
    }

    const DAY: i64 = 86_400;

    #[tokio::test]
    async fn test_save_triggers_rollup_over_count_ceiling() {
        let store = store_with(MaintenanceConfig {
            max_documents: 3,
            ..MaintenanceConfig::default()
        });

        let mut last_receipt = None;
        for i in 0..4 {
            let receipt = store
                .save(
                    NewDocument::new(format!("changelog entry {}", i), "alice", "changelog"),
                    1000 + i,
                )
                .await
                .unwrap();
            last_receipt = Some(receipt);
        }

        let receipt = last_receipt.unwrap();
        assert_eq!(
            receipt.rollups_created, 1,
            "fourth save crosses the ceiling and rolls the week up"
        );

        let summaries = store
            .index()
            .list(&DocFilter::live(DocLevel::Summary))
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_check_quiet_under_ceilings() {
        let store = store_with(MaintenanceConfig::default());
        for i in 0..3 {
            let receipt = store
                .save(NewDocument::new(format!("note {}", i), "alice", "notes"), 1000 + i)
                .await
                .unwrap();
            assert_eq!(receipt.rollups_created, 0);
        }
    }

    #[tokio::test]
    async fn test_compaction_noop_under_size_ceiling() {
        let store = store_with(MaintenanceConfig::default());
        store
            .save(NewDocument::new("small store", "alice", "notes"), 0)
            .await
            .unwrap();

        let stats = periodic_compaction(&store, 100 * DAY).await.unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.archived, 0);
    }

    #[tokio::test]
    async fn test_compaction_archives_lru_half() {
        let store = store_with(MaintenanceConfig {
            compaction_size_mb: 0.0,
            ..MaintenanceConfig::default()
        });

        let body = "a substantial single-paragraph body ".repeat(20);
        let mut ids = Vec::new();
        for i in 0..4i64 {
            let receipt = store
                .save(NewDocument::new(body.clone(), "alice", "notes"), 0)
                .await
                .unwrap();
            store
                .index()
                .update_metadata(
                    &receipt.id,
                    &MetadataPatch {
                        last_access_at: Some((i + 1) * 10),
                        ..MetadataPatch::default()
                    },
                )
                .await
                .unwrap();
            ids.push(receipt.id);
        }

        let stats = periodic_compaction(&store, 100 * DAY).await.unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.archived, 2);

        // The two least-recently-used documents were condensed and archived.
        for id in &ids[..2] {
            let record = store.get(id).await.unwrap().unwrap();
            assert!(record.archived);
            assert!(record.content.chars().count() < body.chars().count());
            assert_eq!(
                record.extra["original_length"].as_u64().unwrap() as usize,
                body.chars().count()
            );
            assert_eq!(record.extra["resummarized"], true);
        }
        for id in &ids[2..] {
            let record = store.get(id).await.unwrap().unwrap();
            assert!(!record.archived);
            assert_eq!(record.content, body);
        }
    }

    #[tokio::test]
    async fn test_compaction_skips_recently_accessed() {
        let store = store_with(MaintenanceConfig {
            compaction_size_mb: 0.0,
            ..MaintenanceConfig::default()
        });

        let now = 100 * DAY;
        for i in 0..4i64 {
            let receipt = store
                .save(NewDocument::new(format!("fresh note {}", i), "alice", "notes"), now)
                .await
                .unwrap();
            // Accessed within the staleness window.
            store
                .index()
                .update_metadata(
                    &receipt.id,
                    &MetadataPatch {
                        last_access_at: Some(now - DAY),
                        ..MetadataPatch::default()
                    },
                )
                .await
                .unwrap();
        }

        let stats = periodic_compaction(&store, now).await.unwrap();
        assert_eq!(stats.processed, 0);
    }
}
