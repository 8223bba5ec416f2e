//! Two-tier retrieval and context formatting.
//!
//! Retrieval prefers rollup summaries (Tier 1) and falls back to raw
//! documents (Tier 2) only when the summary tier cannot fill the requested
//! `k`. Each returned hit is score-thresholded and has its access time
//! touched, which feeds the staleness-based compaction policy.
//!
//! Retrieval augments the caller rather than gating it: any index failure
//! degrades to an empty result instead of propagating.

use anyhow::Result;
use chrono::Utc;

use crate::config::Config;
use crate::embedding::embed_text;
use crate::index::{DocFilter, MetadataPatch};
use crate::models::{DocLevel, RetrievedDocument};
use crate::store::MemoryStore;

/// Returned by [`format_context`] when nothing qualifies.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found for this query.";

/// Per-entry body cap in the formatted context block.
const CONTEXT_BODY_CHARS: usize = 500;

/// Retrieve up to `k` documents relevant to `query`, best first.
///
/// Scores are `1 - distance`; results below `score_threshold` are
/// dropped. An empty query, `k == 0`, or an index failure all yield an
/// empty list — never an error.
pub async fn retrieve(
    store: &MemoryStore,
    query: &str,
    k: usize,
    score_threshold: f64,
    now: i64,
) -> Vec<RetrievedDocument> {
    if query.trim().is_empty() || k == 0 {
        return Vec::new();
    }

    let embedded = embed_text(store.embedding_config(), query).await;

    match retrieve_inner(store, &embedded.vector, k, score_threshold, now).await {
        Ok(results) => results,
        Err(err) => {
            eprintln!("warning: retrieval degraded to empty result: {:#}", err);
            Vec::new()
        }
    }
}

async fn retrieve_inner(
    store: &MemoryStore,
    vector: &[f32],
    k: usize,
    score_threshold: f64,
    now: i64,
) -> Result<Vec<RetrievedDocument>> {
    // Tier 1: rollup summaries.
    let mut results =
        query_tier(store, vector, DocLevel::Summary, k, score_threshold, now).await?;

    // Tier 2: raw documents, only to fill the remainder.
    if results.len() < k {
        let remainder = k - results.len();
        let tier2 = query_tier(
            store,
            vector,
            DocLevel::Document,
            remainder,
            score_threshold,
            now,
        )
        .await?;
        results.extend(tier2);
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(k);
    Ok(results)
}

async fn query_tier(
    store: &MemoryStore,
    vector: &[f32],
    level: DocLevel,
    limit: usize,
    score_threshold: f64,
    now: i64,
) -> Result<Vec<RetrievedDocument>> {
    let neighbors = store
        .index()
        .query(vector, limit, &DocFilter::live(level))
        .await?;

    let mut hits = Vec::with_capacity(neighbors.len());
    for neighbor in neighbors {
        let score = 1.0 - neighbor.distance;
        if score < score_threshold {
            continue;
        }

        // Best-effort access tracking; a lost update only delays
        // compaction eligibility.
        let _ = store
            .index()
            .update_metadata(
                &neighbor.record.id,
                &MetadataPatch {
                    last_access_at: Some(now),
                    ..MetadataPatch::default()
                },
            )
            .await;

        let record = neighbor.record;
        hits.push(RetrievedDocument {
            id: record.id,
            content: record.content,
            doc_type: record.doc_type,
            author: record.author,
            level: record.level,
            created_at: record.created_at,
            score,
            extra: record.extra,
        });
    }
    Ok(hits)
}

/// Render retrieval results as a human-readable context block.
///
/// Each entry is dated, typed, and authored, with its body capped at
/// 500 characters. Empty input yields [`NO_CONTEXT_SENTINEL`].
pub fn format_context(results: &[RetrievedDocument]) -> String {
    if results.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    let mut out = String::from("### Retrieved context\n\n");

    for (i, doc) in results.iter().enumerate() {
        let label = match doc.level {
            DocLevel::Summary => "Weekly summary",
            _ => "Document",
        };
        out.push_str(&format!(
            "**{}** ({}) - {} - {}:\n",
            label,
            format_ts(doc.created_at),
            doc.doc_type,
            doc.author
        ));

        if doc.content.chars().count() > CONTEXT_BODY_CHARS {
            let capped: String = doc.content.chars().take(CONTEXT_BODY_CHARS - 3).collect();
            out.push_str(&capped);
            out.push_str("...");
        } else {
            out.push_str(&doc.content);
        }
        out.push_str("\n\n");

        if i < results.len() - 1 {
            out.push_str("---\n\n");
        }
    }

    out
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// CLI entry point for `ctxmem retrieve`.
pub async fn run_retrieve(
    config: &Config,
    query: &str,
    k: Option<usize>,
    score_threshold: Option<f64>,
    block: bool,
) -> Result<()> {
    let store = MemoryStore::open(config).await?;
    let k = k.unwrap_or(config.retrieval.k);
    let threshold = score_threshold.unwrap_or(config.retrieval.score_threshold);

    let results = retrieve(&store, query, k, threshold, Utc::now().timestamp()).await;

    if block {
        println!("{}", format_context(&results));
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, doc) in results.iter().enumerate() {
        let excerpt: String = doc.content.chars().take(240).collect();
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            doc.score,
            doc.doc_type,
            doc.level.as_str()
        );
        println!("    date: {}", format_ts(doc.created_at));
        println!("    author: {}", doc.author);
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        println!("    id: {}", doc.id);
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, MaintenanceConfig};
    use crate::index::InMemoryIndex;
    use crate::models::NewDocument;
    use serde_json::json;

    fn test_store() -> MemoryStore {
        MemoryStore::new(
            Box::new(InMemoryIndex::new()),
            EmbeddingConfig::default(),
            MaintenanceConfig::default(),
        )
    }

    fn make_result(id: &str, content: &str, level: DocLevel, score: f64) -> RetrievedDocument {
        RetrievedDocument {
            id: id.to_string(),
            content: content.to_string(),
            doc_type: "notes".to_string(),
            author: "alice".to_string(),
            level,
            created_at: 1_700_000_000,
            score,
            extra: json!({}),
        }
    }

    #[test]
    fn test_format_empty_is_sentinel() {
        assert_eq!(format_context(&[]), NO_CONTEXT_SENTINEL);
    }

    #[test]
    fn test_format_caps_body_at_500_chars() {
        let long = "x".repeat(2000);
        let out = format_context(&[make_result("d1", &long, DocLevel::Document, 0.9)]);
        let body: String = out
            .lines()
            .filter(|l| l.starts_with('x'))
            .collect::<Vec<_>>()
            .join("");
        assert!(body.chars().count() <= 500);
        assert!(out.contains("..."));
    }

    #[test]
    fn test_format_labels_levels() {
        let out = format_context(&[
            make_result("s1", "summary body", DocLevel::Summary, 0.9),
            make_result("d1", "document body", DocLevel::Document, 0.8),
        ]);
        assert!(out.starts_with("### Retrieved context"));
        assert!(out.contains("**Weekly summary**"));
        assert!(out.contains("**Document**"));
        assert!(out.contains("---"));
    }

    #[tokio::test]
    async fn test_empty_query_returns_empty() {
        let store = test_store();
        assert!(retrieve(&store, "   ", 5, 0.25, 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_exact_match_ranks_first_and_sorted() {
        let store = test_store();
        store
            .save(NewDocument::new("the deployment runbook", "alice", "notes"), 100)
            .await
            .unwrap();
        let target = store
            .save(NewDocument::new("weekly changelog entry", "bob", "notes"), 100)
            .await
            .unwrap();

        // Identical text embeds identically through the fallback, so the
        // exact match scores 1.0.
        let results = retrieve(&store, "weekly changelog entry", 5, 0.95, 500).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, target.id);
        assert!(results[0].score > 0.99);

        let loose = retrieve(&store, "weekly changelog entry", 5, -1.0, 500).await;
        for pair in loose.windows(2) {
            assert!(pair[0].score >= pair[1].score, "results must be sorted");
        }
        for hit in &loose {
            assert!(hit.score >= -1.0);
        }
    }

    #[tokio::test]
    async fn test_summaries_preferred_over_documents() {
        let store = test_store();
        store
            .save(NewDocument::new("shared wording", "alice", "notes"), 100)
            .await
            .unwrap();
        let summary = NewDocument {
            content: "shared wording".to_string(),
            author: "system".to_string(),
            doc_type: "notes".to_string(),
            version_id: None,
            level: DocLevel::Summary,
            extra: json!({"source_document_ids": []}),
        };
        store.persist(summary, 100).await.unwrap();

        let results = retrieve(&store, "shared wording", 1, 0.95, 500).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].level, DocLevel::Summary);
    }

    #[tokio::test]
    async fn test_archived_documents_excluded() {
        let store = test_store();
        let receipt = store
            .save(NewDocument::new("archived content here", "alice", "notes"), 100)
            .await
            .unwrap();
        store
            .index()
            .update_metadata(
                &receipt.id,
                &MetadataPatch {
                    archived: Some(true),
                    ..MetadataPatch::default()
                },
            )
            .await
            .unwrap();

        let results = retrieve(&store, "archived content here", 5, 0.25, 500).await;
        assert!(results.iter().all(|r| r.id != receipt.id));
    }

    #[tokio::test]
    async fn test_retrieval_touches_last_access() {
        let store = test_store();
        let receipt = store
            .save(NewDocument::new("touch my access time", "alice", "notes"), 100)
            .await
            .unwrap();

        let results = retrieve(&store, "touch my access time", 5, 0.95, 4242).await;
        assert_eq!(results.len(), 1);

        let record = store.get(&receipt.id).await.unwrap().unwrap();
        assert_eq!(record.last_access_at, 4242);
        assert_eq!(record.created_at, 100);
    }
}
