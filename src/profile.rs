//! Dataset profiling.
//!
//! Renders a tabular dataset (headers plus string rows) into a text
//! profile — shape, per-column statistics, and a small data sample — and
//! saves it as a `dataset_profile` document keyed by the dataset name, so
//! re-profiling the same dataset supersedes the previous profile.
//!
//! Parsing the tabular file itself is the caller's concern; this module
//! only profiles already-parsed rows.

use anyhow::Result;
use serde_json::{json, Value};

use crate::models::{NewDocument, SaveReceipt};
use crate::store::MemoryStore;

/// Rows beyond this are ignored when computing statistics.
const SAMPLE_ROWS: usize = 200;

/// Rows shown verbatim in the profile.
const PREVIEW_ROWS: usize = 5;

/// Distinct values listed for a string column.
const SAMPLE_VALUES: usize = 5;

/// Render a text profile of a dataset. Deterministic for identical input.
///
/// Empty cells count as missing. A column whose non-missing sample values
/// all parse as numbers is profiled with min/max/mean; other columns with
/// a distinct-value count and example values.
pub fn profile_dataset(name: &str, headers: &[String], rows: &[Vec<String>]) -> String {
    let sample: Vec<&Vec<String>> = rows.iter().take(SAMPLE_ROWS).collect();

    let mut out = format!(
        "Dataset profile: {}\nRows: {}, Columns: {}\n\nColumns: {}\n\nStatistics:\n",
        name,
        rows.len(),
        headers.len(),
        headers.join(", ")
    );

    for (col, header) in headers.iter().enumerate() {
        let stats = column_stats(col, &sample);
        out.push_str(&format!("- {}: {}\n", header, stats));
    }

    out.push_str("\nData sample:\n");
    for (i, row) in sample.iter().take(PREVIEW_ROWS).enumerate() {
        let mut record = serde_json::Map::new();
        for (col, header) in headers.iter().enumerate() {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            record.insert(header.clone(), Value::String(cell.to_string()));
        }
        out.push_str(&format!("{}. {}\n", i + 1, Value::Object(record)));
    }

    out
}

fn column_stats(col: usize, sample: &[&Vec<String>]) -> Value {
    let cells: Vec<&str> = sample
        .iter()
        .map(|row| row.get(col).map(String::as_str).unwrap_or(""))
        .collect();

    let missing = cells.iter().filter(|c| c.trim().is_empty()).count();
    let present: Vec<&str> = cells
        .iter()
        .copied()
        .filter(|c| !c.trim().is_empty())
        .collect();

    let numbers: Vec<f64> = present
        .iter()
        .filter_map(|c| c.trim().parse::<f64>().ok())
        .collect();

    if !numbers.is_empty() && numbers.len() == present.len() {
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        return json!({
            "min": min,
            "max": max,
            "mean": mean,
            "missing": missing,
        });
    }

    let mut unique: Vec<&str> = Vec::new();
    for cell in &present {
        if !unique.contains(cell) {
            unique.push(cell);
        }
    }
    let samples: Vec<&str> = unique.iter().copied().take(SAMPLE_VALUES).collect();
    json!({
        "unique_count": unique.len(),
        "sample_values": samples,
        "missing": missing,
    })
}

/// Profile a dataset and save it as a versioned `dataset_profile`
/// document. The dataset name doubles as the version key, so saving the
/// same dataset twice supersedes the earlier profile.
pub async fn save_profile(
    store: &MemoryStore,
    name: &str,
    headers: &[String],
    rows: &[Vec<String>],
    now: i64,
) -> Result<SaveReceipt> {
    let content = profile_dataset(name, headers, rows);

    let mut new = NewDocument::new(content, "system", "dataset_profile").with_version(name);
    new.extra = json!({
        "dataset_name": name,
        "rows": rows.len(),
        "columns": headers.len(),
    });

    store.save(new, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, MaintenanceConfig};
    use crate::index::InMemoryIndex;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_column_stats() {
        let out = profile_dataset(
            "measurements",
            &headers(&["value"]),
            &[row(&["1.0"]), row(&["3.0"]), row(&["2.0"]), row(&[""])],
        );
        assert!(out.contains("Dataset profile: measurements"));
        assert!(out.contains("Rows: 4, Columns: 1"));
        assert!(out.contains("\"min\":1.0"));
        assert!(out.contains("\"max\":3.0"));
        assert!(out.contains("\"mean\":2.0"));
        assert!(out.contains("\"missing\":1"));
    }

    #[test]
    fn test_string_column_stats() {
        let out = profile_dataset(
            "labels",
            &headers(&["tag"]),
            &[row(&["alpha"]), row(&["beta"]), row(&["alpha"])],
        );
        assert!(out.contains("\"unique_count\":2"));
        assert!(out.contains("alpha"));
        assert!(out.contains("beta"));
    }

    #[test]
    fn test_deterministic() {
        let h = headers(&["a", "b"]);
        let rows = vec![row(&["1", "x"]), row(&["2", "y"])];
        assert_eq!(
            profile_dataset("d", &h, &rows),
            profile_dataset("d", &h, &rows)
        );
    }

    #[tokio::test]
    async fn test_reprofiling_supersedes() {
        let store = MemoryStore::new(
            Box::new(InMemoryIndex::new()),
            EmbeddingConfig::default(),
            MaintenanceConfig::default(),
        );
        let h = headers(&["value"]);

        let first = save_profile(&store, "sales", &h, &[row(&["1"])], 100)
            .await
            .unwrap();
        let second = save_profile(&store, "sales", &h, &[row(&["1"]), row(&["2"])], 200)
            .await
            .unwrap();

        assert_eq!(second.superseded_id.as_deref(), Some(first.id.as_str()));
        assert!(store.get(&first.id).await.unwrap().unwrap().obsolete);
    }
}
