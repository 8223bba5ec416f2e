//! Core data models for the context-memory store.
//!
//! These types represent the documents, lifecycle metadata, and operation
//! receipts that flow through the save, summarization, and retrieval paths.

use serde_json::Value;

/// Storage tier of a document.
///
/// - `Document` — a raw ingested unit.
/// - `Summary` — a rollup produced by the hierarchical summarizer.
/// - `Delta` — a generated description of the difference between two
///   versions of the same logical document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocLevel {
    Document,
    Summary,
    Delta,
}

impl DocLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocLevel::Document => "document",
            DocLevel::Summary => "summary",
            DocLevel::Delta => "delta",
        }
    }

    pub fn parse(s: &str) -> Option<DocLevel> {
        match s {
            "document" => Some(DocLevel::Document),
            "summary" => Some(DocLevel::Summary),
            "delta" => Some(DocLevel::Delta),
            _ => None,
        }
    }
}

/// A stored document: content, embedding, and lifecycle metadata.
///
/// `obsolete` and `archived` are monotonic — they only ever transition
/// false→true. The embedding is computed at creation time and never
/// recomputed, even when compaction replaces the content.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub content: String,
    pub author: String,
    pub doc_type: String,
    pub version_id: Option<String>,
    pub level: DocLevel,
    pub created_at: i64,
    pub last_access_at: i64,
    pub obsolete: bool,
    pub archived: bool,
    pub embedding: Vec<f32>,
    pub extra: Value,
}

/// Input to a save operation, before an id or embedding is assigned.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub author: String,
    pub doc_type: String,
    pub version_id: Option<String>,
    pub level: DocLevel,
    pub extra: Value,
}

impl NewDocument {
    /// A raw `level=document` unit with empty extra metadata.
    pub fn new(
        content: impl Into<String>,
        author: impl Into<String>,
        doc_type: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            author: author.into(),
            doc_type: doc_type.into(),
            version_id: None,
            level: DocLevel::Document,
            extra: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

/// Outcome of a save, including what the supersession path did.
///
/// `embedding_degraded` is true when the embedding provider failed and the
/// deterministic fallback produced the vector, so callers can distinguish
/// "degraded" from "succeeded normally" without inspecting logs.
#[derive(Debug, Clone)]
pub struct SaveReceipt {
    pub id: String,
    pub superseded_id: Option<String>,
    pub delta_id: Option<String>,
    pub embedding_degraded: bool,
    pub rollups_created: usize,
}

/// A retrieval hit: document plus its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    pub doc_type: String,
    pub author: String,
    pub level: DocLevel,
    pub created_at: i64,
    pub score: f64,
    pub extra: Value,
}

/// Counters reported by a periodic compaction run.
#[derive(Debug, Clone, Default)]
pub struct CompactionStats {
    pub processed: usize,
    pub archived: usize,
    pub size_before_mb: f64,
    pub size_after_mb: f64,
}

/// Merge the keys of `patch` into `base`. Both must be JSON objects;
/// non-object bases are replaced wholesale.
pub fn merge_extra(base: &mut Value, patch: &Value) {
    match (base.as_object_mut(), patch.as_object()) {
        (Some(base_map), Some(patch_map)) => {
            for (key, val) in patch_map {
                base_map.insert(key.clone(), val.clone());
            }
        }
        _ => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_roundtrip() {
        for level in [DocLevel::Document, DocLevel::Summary, DocLevel::Delta] {
            assert_eq!(DocLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(DocLevel::parse("week_summary"), None);
    }

    #[test]
    fn test_merge_extra_overwrites_and_keeps() {
        let mut base = json!({"a": 1, "b": "old"});
        merge_extra(&mut base, &json!({"b": "new", "c": true}));
        assert_eq!(base, json!({"a": 1, "b": "new", "c": true}));
    }

    #[test]
    fn test_merge_extra_non_object_base() {
        let mut base = Value::Null;
        merge_extra(&mut base, &json!({"k": 1}));
        assert_eq!(base, json!({"k": 1}));
    }
}
