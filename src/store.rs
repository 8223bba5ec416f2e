//! The document store: ingestion, version supersession, and delta records.
//!
//! [`MemoryStore`] is the context object the whole subsystem hangs off:
//! it owns the vector index, the embedding configuration, and the
//! maintenance knobs, and is constructed once and passed to every
//! component — there is no ambient global state.
//!
//! # Save flow
//!
//! ```text
//! save(doc)
//!   ├─ validate required fields
//!   ├─ version_id set? ──▶ mark prior version obsolete
//!   │                      └─ persist delta record (predecessor/successor)
//!   ├─ embed + persist new document
//!   └─ maintenance check ──▶ rollup when over budget
//! ```
//!
//! Supersession, delta, and persistence run under a store-wide write lock
//! so concurrent writers to the same `(doc_type, version_id)` key cannot
//! interleave.

use anyhow::{bail, Result};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{Config, EmbeddingConfig, MaintenanceConfig};
use crate::db;
use crate::embedding::embed_text;
use crate::index::{DocFilter, MetadataPatch, SqliteIndex, VectorIndex};
use crate::maintenance;
use crate::models::{DocLevel, DocumentRecord, NewDocument, SaveReceipt};
use crate::summary::{describe_delta, summarize_extractive};

/// Token budget for the bookkeeping summary attached to raw documents.
const BOOKKEEPING_SUMMARY_TOKENS: usize = 128;

/// The context-memory store.
pub struct MemoryStore {
    index: Box<dyn VectorIndex>,
    embedding: EmbeddingConfig,
    maintenance: MaintenanceConfig,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(
        index: Box<dyn VectorIndex>,
        embedding: EmbeddingConfig,
        maintenance: MaintenanceConfig,
    ) -> Self {
        Self {
            index,
            embedding,
            maintenance,
            write_lock: Mutex::new(()),
        }
    }

    /// Open the SQLite-backed store described by `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.store).await?;
        let index = SqliteIndex::new(pool, config.store.path.clone());
        Ok(Self::new(
            Box::new(index),
            config.embedding.clone(),
            config.maintenance.clone(),
        ))
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn embedding_config(&self) -> &EmbeddingConfig {
        &self.embedding
    }

    pub fn maintenance_config(&self) -> &MaintenanceConfig {
        &self.maintenance
    }

    /// Save a document, superseding any prior version with the same
    /// `(doc_type, version_id)` key.
    ///
    /// A superseded predecessor is marked obsolete and a `level=delta`
    /// record describing the change is persisted, referencing both ids.
    /// A failed delta write degrades the audit trail but never blocks the
    /// new version. After persisting, the maintenance check runs; its
    /// failure is also non-fatal. Embedding-provider failures fall back to
    /// the deterministic hash embedding and are reported via
    /// `embedding_degraded` on the receipt.
    pub async fn save(&self, new: NewDocument, now: i64) -> Result<SaveReceipt> {
        if new.content.trim().is_empty()
            || new.author.trim().is_empty()
            || new.doc_type.trim().is_empty()
        {
            bail!("content, author, and doc_type are required");
        }
        if !new.extra.is_object() && !new.extra.is_null() {
            bail!("extra metadata must be a JSON object");
        }

        let _guard = self.write_lock.lock().await;

        let new_id = Uuid::new_v4().to_string();
        let mut superseded_id: Option<String> = None;
        let mut delta_id: Option<String> = None;

        if let Some(ref version_id) = new.version_id {
            let filter = DocFilter {
                doc_type: Some(new.doc_type.clone()),
                version_id: Some(version_id.clone()),
                obsolete: Some(false),
                ..DocFilter::default()
            };
            let mut priors = self.index.list(&filter).await?;

            if !priors.is_empty() {
                // Newest first; the newest is the delta's predecessor.
                priors.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                });

                for prior in &priors {
                    self.index
                        .update_metadata(
                            &prior.id,
                            &MetadataPatch {
                                obsolete: Some(true),
                                ..MetadataPatch::default()
                            },
                        )
                        .await?;
                }

                let predecessor = &priors[0];
                superseded_id = Some(predecessor.id.clone());

                let delta = NewDocument {
                    content: describe_delta(&predecessor.content, &new.content),
                    author: new.author.clone(),
                    doc_type: new.doc_type.clone(),
                    version_id: None,
                    level: DocLevel::Delta,
                    extra: serde_json::json!({
                        "predecessor_id": predecessor.id,
                        "successor_id": new_id,
                    }),
                };
                match self.persist(delta, now).await {
                    Ok((id, _)) => delta_id = Some(id),
                    Err(err) => {
                        eprintln!("warning: failed to persist delta record: {:#}", err);
                    }
                }
            }
        }

        let (id, embedding_degraded) = self.persist_with_id(new_id, new, now).await?;

        // Post-save maintenance; a failed check never fails the save.
        let rollups_created = match maintenance::check_and_maintain(self, now).await {
            Ok(created) => created,
            Err(err) => {
                eprintln!("warning: maintenance check failed: {:#}", err);
                0
            }
        };

        Ok(SaveReceipt {
            id,
            superseded_id,
            delta_id,
            embedding_degraded,
            rollups_created,
        })
    }

    /// Retrieve a stored record by id.
    pub async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        self.index.get(id).await
    }

    /// Embed and persist a document without running supersession or the
    /// maintenance check. Used by the summarizer so a rollup can never
    /// re-trigger itself. Returns the id and whether the embedding
    /// degraded to the fallback.
    pub(crate) async fn persist(&self, new: NewDocument, now: i64) -> Result<(String, bool)> {
        self.persist_with_id(Uuid::new_v4().to_string(), new, now)
            .await
    }

    async fn persist_with_id(
        &self,
        id: String,
        new: NewDocument,
        now: i64,
    ) -> Result<(String, bool)> {
        let embedded = embed_text(&self.embedding, &new.content).await;

        let mut extra = if new.extra.is_object() {
            new.extra
        } else {
            Value::Object(serde_json::Map::new())
        };
        if new.level == DocLevel::Document {
            if let Some(map) = extra.as_object_mut() {
                map.insert(
                    "summary".to_string(),
                    Value::String(summarize_extractive(
                        &new.content,
                        BOOKKEEPING_SUMMARY_TOKENS,
                    )),
                );
            }
        }

        let record = DocumentRecord {
            id: id.clone(),
            content: new.content,
            author: new.author,
            doc_type: new.doc_type,
            version_id: new.version_id,
            level: new.level,
            created_at: now,
            last_access_at: now,
            obsolete: false,
            archived: false,
            embedding: embedded.vector,
            extra,
        };

        self.index.upsert(&record).await?;
        Ok((id, embedded.degraded))
    }
}

/// CLI entry point for `ctxmem save`.
pub async fn run_save(
    config: &Config,
    content: String,
    author: String,
    doc_type: String,
    version_id: Option<String>,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let store = MemoryStore::open(config).await?;

    let mut new = NewDocument::new(content, author, doc_type);
    if let Some(version) = version_id {
        new = new.with_version(version);
    }
    if let Some(map) = new.extra.as_object_mut() {
        for (key, value) in meta {
            map.insert(key, Value::String(value));
        }
    }

    let receipt = store.save(new, Utc::now().timestamp()).await?;

    println!("saved {}", receipt.id);
    if receipt.embedding_degraded {
        println!("  embedding: fallback");
    }
    if let Some(ref old) = receipt.superseded_id {
        println!("  superseded: {}", old);
    }
    if let Some(ref delta) = receipt.delta_id {
        println!("  delta: {}", delta);
    }
    if receipt.rollups_created > 0 {
        println!("  rollups created: {}", receipt.rollups_created);
    }
    Ok(())
}
