//! Document retrieval by id.
//!
//! Fetches a single stored record, lifecycle flags included. Archived and
//! obsolete documents stay addressable here even though retrieval excludes
//! them.

use anyhow::Result;

use crate::config::Config;
use crate::store::MemoryStore;

/// CLI entry point — prints the record to stdout.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let store = MemoryStore::open(config).await?;

    let record = match store.get(id).await? {
        Some(record) => record,
        None => {
            eprintln!("Error: document not found: {}", id);
            std::process::exit(1);
        }
    };

    println!("--- Document ---");
    println!("id:             {}", record.id);
    println!("author:         {}", record.author);
    println!("doc_type:       {}", record.doc_type);
    if let Some(ref version) = record.version_id {
        println!("version_id:     {}", version);
    }
    println!("level:          {}", record.level.as_str());
    println!("created_at:     {}", format_ts_iso(record.created_at));
    println!("last_access_at: {}", format_ts_iso(record.last_access_at));
    println!("obsolete:       {}", record.obsolete);
    println!("archived:       {}", record.archived);
    println!("extra:          {}", record.extra);
    println!();

    println!("--- Body ---");
    println!("{}", record.content);

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
