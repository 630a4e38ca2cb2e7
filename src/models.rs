//! Core data models shared by the build and query pipelines.
//!
//! A [`MetadataRecord`] is one row of the metadata ledger. A
//! [`DocumentChunk`] is a bounded span of a document's extracted text
//! carrying its own copy of that row.

use serde::{Deserialize, Serialize};

/// The six ledger columns, in the fixed order they are written.
pub const LEDGER_COLUMNS: [&str; 6] = [
    "Filename",
    "Policy Number",
    "Policy Name",
    "Effective Date",
    "Review Due Date",
    "Document Type",
];

/// Per-document metadata, keyed in the ledger by normalized filename.
///
/// Every field is a plain string. A missing value is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub filename: String,
    pub policy_number: String,
    pub policy_name: String,
    pub effective_date: String,
    pub review_due_date: String,
    pub document_type: String,
}

impl MetadataRecord {
    /// Values in [`LEDGER_COLUMNS`] order.
    pub fn to_row(&self) -> [&str; 6] {
        [
            &self.filename,
            &self.policy_number,
            &self.policy_name,
            &self.effective_date,
            &self.review_due_date,
            &self.document_type,
        ]
    }

    /// The copy attached to chunks: date escape markers removed.
    ///
    /// Spreadsheet users prefix dates with `'` to stop auto-formatting. The
    /// ledger file keeps the raw value; everything downstream sees the
    /// stripped one.
    pub fn for_chunks(&self) -> MetadataRecord {
        MetadataRecord {
            effective_date: strip_escape_marker(&self.effective_date),
            review_due_date: strip_escape_marker(&self.review_due_date),
            ..self.clone()
        }
    }
}

/// Remove leading apostrophes, then surrounding whitespace.
pub fn strip_escape_marker(value: &str) -> String {
    value.trim_start_matches('\'').trim().to_string()
}

/// A chunk of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub chunk_index: i64,
    pub source_filename: String,
    pub content: String,
    /// SHA-256 of `content`.
    pub hash: String,
    pub metadata: MetadataRecord,
}
