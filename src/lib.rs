//! # Policy Index
//!
//! Turns a directory of clinical policy PDFs into a question-answering
//! index whose every passage carries the document's reference metadata
//! (policy number, name, effective date, review-due date, document type).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌─────────┐   ┌────────────┐
//! │  Ledger  │──▶│ Resolver  │──▶│ Extractor  │──▶│ Chunker │──▶│   Index    │
//! │  (CSV)   │   │ (operator)│   │ (text/OCR) │   │         │   │ index.json │
//! └──────────┘   └───────────┘   └────────────┘   └─────────┘   └─────┬──────┘
//!                                                                     │
//!                                                  ┌──────────────────┤
//!                                                  ▼                  ▼
//!                                             ┌──────────┐      ┌──────────┐
//!                                             │   CLI    │      │   HTTP   │
//!                                             │  (ask)   │      │ (/ask)   │
//!                                             └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! policyctx build                       # prompts for PDFs missing from the ledger
//! policyctx ask "Who may remove sutures?"
//! policyctx serve                       # POST /ask on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Ledger records and document chunks |
//! | [`ledger`] | Reference metadata CSV load/save |
//! | [`resolver`] | Metadata for PDFs missing from the ledger |
//! | [`discover`] | Document root scan |
//! | [`extract`] | PDF text layer with per-page OCR fallback |
//! | [`ocr`] | Tesseract OCR via poppler rasterization |
//! | [`chunk`] | Overlapping window chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted similarity index |
//! | [`answer`] | Answer generation over retrieved passages |
//! | [`review`] | Review-due status evaluation |
//! | [`ingest`] | Build pipeline orchestration |
//! | [`ask`] | Query engine and remote client |
//! | [`export`] | Indexed metadata CSV export |
//! | [`server`] | HTTP query service |
//! | [`progress`] | Build progress reporting |

pub mod answer;
pub mod ask;
pub mod chunk;
pub mod config;
pub mod discover;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod ledger;
pub mod models;
pub mod ocr;
pub mod progress;
pub mod resolver;
pub mod review;
pub mod server;
