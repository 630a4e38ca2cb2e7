//! The metadata ledger: one CSV row of policy metadata per document.
//!
//! The ledger is maintained by people in a spreadsheet, so loading is
//! forgiving: the header may carry a byte-order marker or a mangled
//! `Filename` column name, columns may appear in any order, and rows that
//! cannot be keyed are skipped rather than failing the load.
//!
//! Saving always writes the six known columns in fixed order and replaces
//! the whole file. The new contents go to a temporary file in the same
//! directory which is then renamed over the old ledger, so a crash mid-write
//! leaves the previous ledger intact.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{MetadataRecord, LEDGER_COLUMNS};
use crate::review::evaluate_review_today;

const BOM: char = '\u{feff}';

/// Join key between ledger rows and files on disk.
pub fn normalize_filename(name: &str) -> String {
    name.trim().to_lowercase()
}

/// In-memory ledger, keyed by [`normalize_filename`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<String, MetadataRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger from `path`. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "ledger file not found, starting empty");
            return Ok(Self::new());
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open ledger: {}", path.display()))?;
        let ledger = Self::from_reader(file)
            .with_context(|| format!("Failed to read ledger: {}", path.display()))?;
        info!(path = %path.display(), entries = ledger.len(), "ledger loaded");
        Ok(ledger)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = ColumnMap::from_headers(rdr.headers()?);
        let mut ledger = Self::new();

        for (i, result) in rdr.records().enumerate() {
            // Header is line 1.
            let line = i + 2;
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!(line, error = %e, "skipping unreadable ledger row");
                    continue;
                }
            };

            let Some(filename_idx) = columns.filename else {
                warn!(line, row = ?row, "skipping ledger row: no 'Filename' column");
                continue;
            };

            let cell = |idx: Option<usize>| -> String {
                idx.and_then(|i| row.get(i)).unwrap_or_default().to_string()
            };

            let record = MetadataRecord {
                filename: cell(Some(filename_idx)),
                policy_number: cell(columns.policy_number),
                policy_name: cell(columns.policy_name),
                effective_date: cell(columns.effective_date),
                review_due_date: cell(columns.review_due_date),
                document_type: cell(columns.document_type),
            };

            if record.filename.trim().is_empty() {
                warn!(line, "skipping ledger row: empty filename");
                continue;
            }

            if let Some(previous) = ledger.insert(record) {
                debug!(filename = %previous.filename, line, "duplicate ledger row replaced");
            }
        }

        Ok(ledger)
    }

    /// Replace the ledger file at `path` with the current entries.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create ledger directory: {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        self.write_to(&mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace ledger: {}", path.display()))?;

        info!(path = %path.display(), entries = self.len(), "ledger saved");
        Ok(())
    }

    /// Write the six fixed columns for every entry.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(LEDGER_COLUMNS)?;
        for record in self.entries.values() {
            wtr.write_record(record.to_row())?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Insert under the record's normalized filename, returning any entry it replaced.
    pub fn insert(&mut self, record: MetadataRecord) -> Option<MetadataRecord> {
        self.entries
            .insert(normalize_filename(&record.filename), record)
    }

    /// Look up by any spelling of the filename.
    pub fn get(&self, filename: &str) -> Option<&MetadataRecord> {
        self.entries.get(&normalize_filename(filename))
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(&normalize_filename(filename))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataRecord)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Header positions for each known column.
#[derive(Debug, Default)]
struct ColumnMap {
    filename: Option<usize>,
    policy_number: Option<usize>,
    policy_name: Option<usize>,
    effective_date: Option<usize>,
    review_due_date: Option<usize>,
    document_type: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let names: Vec<String> = headers.iter().map(clean_header).collect();
        let find = |wanted: &str| names.iter().position(|n| n == wanted);

        Self {
            // Encoding damage tends to append junk to the name, so match on prefix.
            filename: names.iter().position(|n| n.starts_with("filename")),
            policy_number: find("policy number"),
            policy_name: find("policy name"),
            effective_date: find("effective date"),
            review_due_date: find("review due date"),
            document_type: find("document type"),
        }
    }
}

fn clean_header(name: &str) -> String {
    name.trim_start_matches(BOM).trim().to_lowercase()
}

/// `policyctx ledger`: list every entry with its review status.
pub fn run_list(config: &Config) -> Result<()> {
    let ledger = Ledger::load(&config.ledger.path)?;

    println!(
        "ledger {} ({} entries)",
        config.ledger.path.display(),
        ledger.len()
    );
    if ledger.is_empty() {
        return Ok(());
    }

    println!(
        "  {:<36} {:<14} {:<10} REVIEW",
        "FILENAME", "NUMBER", "TYPE"
    );
    println!("  {}", "-".repeat(84));
    for (_, record) in ledger.iter() {
        let clean = record.for_chunks();
        let note = evaluate_review_today(&clean.review_due_date, &config.review.server_format);
        println!(
            "  {:<36} {:<14} {:<10} {}",
            record.filename, record.policy_number, record.document_type, note
        );
    }
    Ok(())
}
