//! Export the metadata stored in the index as CSV.
//!
//! Chunks carry their own copy of the ledger row, so the index alone is
//! enough to list what was indexed. One row per source file, in the ledger
//! column order, sorted by filename.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::index::PolicyIndex;
use crate::models::{MetadataRecord, LEDGER_COLUMNS};

/// The first record seen for each source filename.
pub fn indexed_records(index: &PolicyIndex) -> Vec<MetadataRecord> {
    let mut by_file: BTreeMap<&str, &MetadataRecord> = BTreeMap::new();
    for chunk in index.chunks() {
        by_file
            .entry(chunk.source_filename.as_str())
            .or_insert(&chunk.metadata);
    }
    by_file.into_values().cloned().collect()
}

pub fn write_csv<W: Write>(records: &[MetadataRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(LEDGER_COLUMNS)?;
    for record in records {
        wtr.write_record(record.to_row())?;
    }
    wtr.flush()?;
    Ok(())
}

/// `policyctx export`: to `output` when given, otherwise stdout.
pub fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let index = PolicyIndex::load(&config.index.path)?;
    let records = indexed_records(&index);

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&records, file)?;
            info!(path = %path.display(), documents = records.len(), "exported metadata");
            eprintln!("Exported {} documents to {}", records.len(), path.display());
        }
        None => {
            write_csv(&records, std::io::stdout().lock())?;
        }
    }

    Ok(())
}
