use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Persistence root of the store. The SQLite database and its sidecar
/// files live under this directory; its total byte size is what the
/// maintenance ceilings are measured against.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl StoreConfig {
    pub fn db_path(&self) -> PathBuf {
        self.path.join("context.sqlite")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_score_threshold() -> f64 {
    0.25
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceConfig {
    /// Document-count ceiling; exceeding it triggers a rollup after save.
    #[serde(default = "default_max_documents")]
    pub max_documents: u64,
    /// Store-size ceiling in MB; exceeding it triggers a rollup after save.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: f64,
    /// Store-size ceiling in MB below which periodic compaction is a no-op.
    #[serde(default = "default_compaction_size_mb")]
    pub compaction_size_mb: f64,
    /// Staleness window in days for compaction candidates.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            max_size_mb: default_max_size_mb(),
            compaction_size_mb: default_compaction_size_mb(),
            stale_after_days: default_stale_after_days(),
        }
    }
}

fn default_max_documents() -> u64 {
    1000
}
fn default_max_size_mb() -> f64 {
    5.0
}
fn default_compaction_size_mb() -> f64 {
    1024.0
}
fn default_stale_after_days() -> i64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.score_threshold) {
        anyhow::bail!("retrieval.score_threshold must be in [0.0, 1.0]");
    }

    // Validate maintenance
    if config.maintenance.max_documents == 0 {
        anyhow::bail!("maintenance.max_documents must be > 0");
    }

    if config.maintenance.stale_after_days < 1 {
        anyhow::bail!("maintenance.stale_after_days must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config: Config = toml::from_str("[store]\npath = \"/tmp/store\"\n").unwrap();
        assert_eq!(config.retrieval.k, 5);
        assert!((config.retrieval.score_threshold - 0.25).abs() < 1e-12);
        assert_eq!(config.maintenance.max_documents, 1000);
        assert!((config.maintenance.max_size_mb - 5.0).abs() < 1e-12);
        assert!((config.maintenance.compaction_size_mb - 1024.0).abs() < 1e-12);
        assert_eq!(config.maintenance.stale_after_days, 30);
        assert_eq!(config.embedding.provider, "disabled");
    }
}
