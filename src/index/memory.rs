//! In-memory [`VectorIndex`] implementation for tests.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over all stored embeddings.
//! `storage_bytes` reports an approximation (content plus embedding bytes)
//! so size-triggered maintenance paths can be exercised without a disk.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{merge_extra, DocumentRecord};

use super::{DocFilter, MetadataPatch, Neighbor, VectorIndex};

/// In-memory index for testing.
pub struct InMemoryIndex {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, record: &DocumentRecord) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.get(id).cloned())
    }

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()> {
        let mut records = self.records.write().unwrap();
        if let Some(record) = records.get_mut(id) {
            if let Some(obsolete) = patch.obsolete {
                record.obsolete = obsolete;
            }
            if let Some(archived) = patch.archived {
                record.archived = archived;
            }
            if let Some(ts) = patch.last_access_at {
                record.last_access_at = ts;
            }
        }
        Ok(())
    }

    async fn replace_content(&self, id: &str, content: &str, extra_merge: &serde_json::Value) -> Result<()> {
        let mut records = self.records.write().unwrap();
        if let Some(record) = records.get_mut(id) {
            record.content = content.to_string();
            merge_extra(&mut record.extra, extra_merge);
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize, filter: &DocFilter) -> Result<Vec<Neighbor>> {
        let records = self.records.read().unwrap();
        let mut neighbors: Vec<Neighbor> = records
            .values()
            .filter(|r| filter.matches(r))
            .map(|r| {
                let similarity = cosine_similarity(vector, &r.embedding) as f64;
                Neighbor {
                    record: r.clone(),
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
        let records = self.records.read().unwrap();
        let mut matched: Vec<DocumentRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn count(&self) -> Result<u64> {
        let records = self.records.read().unwrap();
        Ok(records.len() as u64)
    }

    async fn storage_bytes(&self) -> Result<u64> {
        let records = self.records.read().unwrap();
        let total: usize = records
            .values()
            .map(|r| r.content.len() + r.embedding.len() * 4)
            .sum();
        Ok(total as u64)
    }

    async fn compact(&self) -> Result<()> {
        Ok(())
    }
}
