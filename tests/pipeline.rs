//! End-to-end build and query through the library API, with a fake text
//! layer standing in for real PDFs.

use policy_index::answer::ExtractiveAnswerer;
use policy_index::ask::QueryEngine;
use policy_index::config::Config;
use policy_index::embedding::DisabledProvider;
use policy_index::extract::{ExtractError, Extractor, TextLayer};
use policy_index::index::PolicyIndex;
use policy_index::ingest;
use policy_index::ledger::Ledger;
use policy_index::ocr::OcrEngine;
use policy_index::progress::NoProgress;
use policy_index::resolver::FailFastResolver;
use policy_index::review::{ReviewStatus, ISO_FORMAT};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Pages separated by form feeds; a blank page has no text layer.
struct FormFeedPages;

impl TextLayer for FormFeedPages {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        Ok(text.split('\x0c').map(str::to_string).collect())
    }
}

#[derive(Default)]
struct CountingOcr {
    pages: Cell<usize>,
}

impl OcrEngine for CountingOcr {
    fn recognize_page(&self, _pdf: &Path, page_number: usize) -> Result<String, ExtractError> {
        self.pages.set(self.pages.get() + 1);
        Ok(format!("Scanned signature page {} for restraint orders.", page_number))
    }
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let pdfs = root.join("pdfs");
    fs::create_dir_all(&pdfs).unwrap();

    fs::write(
        pdfs.join("Suturing.pdf"),
        "Sutures are removed by a registered nurse after ten days.\x0c\
         Document the removal in the wound care flowsheet.",
    )
    .unwrap();
    fs::write(
        pdfs.join("Restraints.pdf"),
        "Restraint orders must be renewed every 24 hours.\x0c ",
    )
    .unwrap();
    // Invalid UTF-8 makes the fake text layer fail for this file only.
    fs::write(pdfs.join("Broken.pdf"), [0xff, 0xfe, 0x00]).unwrap();

    fs::write(
        root.join("ledger.csv"),
        "Filename,Policy Number,Policy Name,Effective Date,Review Due Date,Document Type\n\
         suturing.pdf,11-010-00,Suturing,2018-02-10,'2000-01-01,Policy\n\
         Restraints.pdf,Unnumbered,Restraints,2020-01-03,2099-01-01,Policy\n\
         Broken.pdf,01-000-00,Broken,2020-01-01,,Reference\n",
    )
    .unwrap();

    let mut config = Config::minimal();
    config.ledger.path = root.join("ledger.csv");
    config.documents.root = pdfs;
    config.index.path = root.join("index");
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;
    (tmp, config)
}

#[tokio::test]
async fn build_then_ask() {
    let (_tmp, config) = setup();
    let ocr = CountingOcr::default();
    let extractor = Extractor::new(&FormFeedPages, Some(&ocr));

    let report = ingest::build(
        &config,
        false,
        &mut FailFastResolver,
        &extractor,
        &DisabledProvider,
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(report.files_found, 3);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "Broken.pdf");
    assert_eq!(ocr.pages.get(), 1);

    let ledger = Ledger::load(&config.ledger.path).unwrap();
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.get("Suturing.pdf").unwrap().review_due_date, "'2000-01-01");

    let index = PolicyIndex::load(&config.index.path).unwrap();
    assert!(index
        .chunks()
        .all(|c| c.source_filename != "Broken.pdf"));
    assert!(index
        .chunks()
        .any(|c| c.content.contains("Scanned signature page 2")));

    let engine = QueryEngine::new(
        index,
        Box::new(DisabledProvider),
        Box::new(ExtractiveAnswerer),
        config.index.top_k,
    );
    let response = engine
        .ask("Who removes sutures?", None, ISO_FORMAT)
        .await
        .unwrap();
    assert!(response.answer.contains("registered nurse"));
    let source = &response.sources[0];
    assert_eq!(source.metadata.policy_number, "11-010-00");
    assert_eq!(source.metadata.review_due_date, "2000-01-01");
    assert_eq!(source.review.status, ReviewStatus::Overdue);
}
