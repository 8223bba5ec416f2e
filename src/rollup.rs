//! Hierarchical summarization: weekly rollups of raw documents.
//!
//! Live documents are grouped by `(ISO year-week of creation, doc_type)`.
//! Any group with at least three members is compressed into a single
//! `level=summary` document and its members are archived, so future
//! retrieval can prefer the cheap summary tier. Smaller groups are left
//! alone — too little signal to compress.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Datelike, Utc};
use serde_json::json;

use crate::config::Config;
use crate::index::{DocFilter, MetadataPatch};
use crate::models::{DocLevel, DocumentRecord, NewDocument};
use crate::store::MemoryStore;
use crate::summary::summarize_extractive;

/// Minimum group size worth rolling up.
const GROUP_MIN_DOCS: usize = 3;

/// Per-member excerpt length fed into the rollup summary.
const MEMBER_EXCERPT_CHARS: usize = 1000;

/// Token budget of a rollup summary.
const ROLLUP_SUMMARY_TOKENS: usize = 256;

/// ISO year-week bucket of a timestamp, formatted `YYYY-Www`.
///
/// Pure function of the timestamp, so grouping stays testable without a
/// clock in the loop.
pub fn iso_year_week(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| {
            let week = dt.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        })
        .unwrap_or_else(|| ts.to_string())
}

/// Roll up eligible document groups into weekly summaries.
///
/// Returns the number of summaries created. Groups referencing a record
/// that has meanwhile disappeared are skipped; the rest of the run
/// continues.
pub async fn roll_up(store: &MemoryStore, now: i64) -> Result<usize> {
    let docs = store
        .index()
        .list(&DocFilter::live(DocLevel::Document))
        .await?;

    // BTreeMap for a deterministic processing order.
    let mut groups: BTreeMap<(String, String), Vec<&DocumentRecord>> = BTreeMap::new();
    for doc in &docs {
        groups
            .entry((iso_year_week(doc.created_at), doc.doc_type.clone()))
            .or_default()
            .push(doc);
    }

    let mut created = 0usize;

    for ((week, doc_type), members) in groups {
        if members.len() < GROUP_MIN_DOCS {
            continue;
        }

        // The listing may be stale; a vanished member makes the group
        // malformed and it is skipped, not the whole run.
        let mut intact = true;
        for member in &members {
            if store.index().get(&member.id).await?.is_none() {
                intact = false;
                break;
            }
        }
        if !intact {
            eprintln!(
                "warning: skipping rollup group {} / {}: member no longer present",
                week, doc_type
            );
            continue;
        }

        let combined: String = members
            .iter()
            .map(|m| m.content.chars().take(MEMBER_EXCERPT_CHARS).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n");
        let summary_text = summarize_extractive(&combined, ROLLUP_SUMMARY_TOKENS);

        let member_ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
        let summary = NewDocument {
            content: summary_text,
            author: "system".to_string(),
            doc_type: doc_type.clone(),
            version_id: None,
            level: DocLevel::Summary,
            extra: json!({
                "source_document_ids": member_ids,
                "week": week,
            }),
        };
        store.persist(summary, now).await?;

        // Archive the sources immediately — summary creation and source
        // archival form one logical unit.
        for member in &members {
            store
                .index()
                .update_metadata(
                    &member.id,
                    &MetadataPatch {
                        archived: Some(true),
                        ..MetadataPatch::default()
                    },
                )
                .await?;
        }

        created += 1;
    }

    Ok(created)
}

/// CLI entry point for `ctxmem rollup`.
pub async fn run_rollup(config: &Config) -> Result<()> {
    let store = MemoryStore::open(config).await?;
    let created = roll_up(&store, Utc::now().timestamp()).await?;
    println!("summaries created: {}", created);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, MaintenanceConfig};
    use crate::index::InMemoryIndex;

    fn test_store() -> MemoryStore {
        MemoryStore::new(
            Box::new(InMemoryIndex::new()),
            EmbeddingConfig::default(),
            MaintenanceConfig::default(),
        )
    }

    const DAY: i64 = 86_400;

    #[test]
    fn test_iso_year_week_buckets() {
        // 1970-01-01 was a Thursday, inside ISO week 1970-W01.
        assert_eq!(iso_year_week(0), "1970-W01");
        // Sunday of the same ISO week.
        assert_eq!(iso_year_week(3 * DAY), "1970-W01");
        // The following Monday starts W02.
        assert_eq!(iso_year_week(4 * DAY), "1970-W02");
    }

    #[tokio::test]
    async fn test_group_of_two_not_rolled_up() {
        let store = test_store();
        for i in 0..2 {
            store
                .save(
                    NewDocument::new(format!("changelog entry {}", i), "alice", "changelog"),
                    1000 + i,
                )
                .await
                .unwrap();
        }

        let created = roll_up(&store, 2000).await.unwrap();
        assert_eq!(created, 0);
        let summaries = store
            .index()
            .list(&DocFilter::live(DocLevel::Summary))
            .await
            .unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn test_group_of_three_rolled_up_and_archived() {
        let store = test_store();
        let mut ids = Vec::new();
        for i in 0..3 {
            let receipt = store
                .save(
                    NewDocument::new(format!("changelog entry {}", i), "alice", "changelog"),
                    1000 + i,
                )
                .await
                .unwrap();
            ids.push(receipt.id);
        }

        let created = roll_up(&store, 2000).await.unwrap();
        assert_eq!(created, 1);

        for id in &ids {
            let record = store.get(id).await.unwrap().unwrap();
            assert!(record.archived, "source {} must be archived", id);
        }

        let summaries = store
            .index()
            .list(&DocFilter::live(DocLevel::Summary))
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.doc_type, "changelog");
        assert_eq!(summary.author, "system");
        assert_eq!(summary.extra["source_document_ids"].as_array().unwrap().len(), 3);
        assert_eq!(summary.extra["week"], iso_year_week(1000));
    }

    #[tokio::test]
    async fn test_groups_split_by_type() {
        let store = test_store();
        for i in 0..3 {
            store
                .save(
                    NewDocument::new(format!("changelog entry {}", i), "alice", "changelog"),
                    1000 + i,
                )
                .await
                .unwrap();
        }
        for i in 0..2 {
            store
                .save(NewDocument::new(format!("note {}", i), "bob", "notes"), 1000 + i)
                .await
                .unwrap();
        }

        let created = roll_up(&store, 2000).await.unwrap();
        assert_eq!(created, 1, "only the changelog group qualifies");

        let notes = store
            .index()
            .list(&DocFilter {
                doc_type: Some("notes".to_string()),
                ..DocFilter::live(DocLevel::Document)
            })
            .await
            .unwrap();
        assert_eq!(notes.len(), 2, "undersized group left untouched");
    }

    #[tokio::test]
    async fn test_groups_split_by_week() {
        let store = test_store();
        // Two documents in one ISO week, one in the next.
        for ts in [0, DAY, 5 * DAY] {
            store
                .save(NewDocument::new(format!("entry at {}", ts), "alice", "notes"), ts)
                .await
                .unwrap();
        }

        let created = roll_up(&store, 10 * DAY).await.unwrap();
        assert_eq!(created, 0);
    }

    #[tokio::test]
    async fn test_rollup_idempotent_after_archival() {
        let store = test_store();
        for i in 0..3 {
            store
                .save(
                    NewDocument::new(format!("changelog entry {}", i), "alice", "changelog"),
                    1000 + i,
                )
                .await
                .unwrap();
        }

        assert_eq!(roll_up(&store, 2000).await.unwrap(), 1);
        // Sources are archived now, so a second pass finds nothing.
        assert_eq!(roll_up(&store, 3000).await.unwrap(), 0);
    }
}
