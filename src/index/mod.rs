//! Vector-index abstraction for the context-memory store.
//!
//! The [`VectorIndex`] trait is the narrow interface the store consumes:
//! a persistent keyed record store with metadata-filtered nearest-neighbor
//! queries. The store never assumes anything about the backing engine
//! beyond these operations, so backends are pluggable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Insert or replace a document record |
//! | [`get`](VectorIndex::get) | Retrieve a record by id |
//! | [`update_metadata`](VectorIndex::update_metadata) | Flip lifecycle flags / touch access time |
//! | [`replace_content`](VectorIndex::replace_content) | Swap content during compaction |
//! | [`query`](VectorIndex::query) | Nearest-neighbor search under a metadata filter |
//! | [`list`](VectorIndex::list) | Fetch all records matching a metadata filter |
//! | [`count`](VectorIndex::count) | Total stored records |
//! | [`storage_bytes`](VectorIndex::storage_bytes) | On-disk footprint of the store |
//! | [`compact`](VectorIndex::compact) | Engine-specific space reclamation |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{DocLevel, DocumentRecord};

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

/// Metadata predicate for queries and listings. `None` fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct DocFilter {
    pub level: Option<DocLevel>,
    pub obsolete: Option<bool>,
    pub archived: Option<bool>,
    pub doc_type: Option<String>,
    pub version_id: Option<String>,
    pub last_access_before: Option<i64>,
}

impl DocFilter {
    /// The live slice of a storage tier: not obsolete, not archived.
    pub fn live(level: DocLevel) -> Self {
        Self {
            level: Some(level),
            obsolete: Some(false),
            archived: Some(false),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        if let Some(level) = self.level {
            if record.level != level {
                return false;
            }
        }
        if let Some(obsolete) = self.obsolete {
            if record.obsolete != obsolete {
                return false;
            }
        }
        if let Some(archived) = self.archived {
            if record.archived != archived {
                return false;
            }
        }
        if let Some(ref doc_type) = self.doc_type {
            if &record.doc_type != doc_type {
                return false;
            }
        }
        if let Some(ref version_id) = self.version_id {
            if record.version_id.as_deref() != Some(version_id.as_str()) {
                return false;
            }
        }
        if let Some(cutoff) = self.last_access_before {
            if record.last_access_at >= cutoff {
                return false;
            }
        }
        true
    }
}

/// Partial metadata update. `None` fields are left untouched. Lifecycle
/// flags are only ever raised — callers never set them back to false.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub obsolete: Option<bool>,
    pub archived: Option<bool>,
    pub last_access_at: Option<i64>,
}

/// A nearest-neighbor hit: the stored record and its distance from the
/// query vector (`0.0` = identical direction).
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub record: DocumentRecord,
    pub distance: f64,
}

/// Abstract vector-index backend.
///
/// All operations are async (via `async-trait`). In-memory
/// implementations return immediately-ready futures.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a record by id.
    async fn upsert(&self, record: &DocumentRecord) -> Result<()>;

    /// Retrieve a record by id.
    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Apply a metadata patch to a record. Unknown ids are a no-op.
    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()>;

    /// Replace a record's content and merge keys into its extra metadata.
    /// The stored embedding is left untouched.
    async fn replace_content(&self, id: &str, content: &str, extra_merge: &Value) -> Result<()>;

    /// Return up to `k` nearest neighbors of `vector` among records
    /// matching `filter`, ordered by ascending distance.
    async fn query(&self, vector: &[f32], k: usize, filter: &DocFilter) -> Result<Vec<Neighbor>>;

    /// Fetch all records matching `filter`.
    async fn list(&self, filter: &DocFilter) -> Result<Vec<DocumentRecord>>;

    /// Total number of stored records.
    async fn count(&self) -> Result<u64>;

    /// Byte footprint of the store's persistence root.
    async fn storage_bytes(&self) -> Result<u64>;

    /// Engine-specific space reclamation, invoked once per compaction run.
    async fn compact(&self) -> Result<()>;
}
