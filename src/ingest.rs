//! Build pipeline orchestration.
//!
//! Coordinates the full build: ledger load → discovery → metadata
//! resolution → extraction (with OCR fallback) → chunking → ledger save →
//! embedding → index save.
//!
//! Files are processed one at a time. A file that fails to extract is
//! logged, recorded in the [`BuildReport`], and skipped; the rest of the
//! batch continues. A resolver error (for example `--resolve fail-fast`
//! meeting an unknown file) aborts the build before anything is written.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunk::{chunk_document, Chunker};
use crate::config::Config;
use crate::discover::{discover_pdfs, DiscoveredPdf};
use crate::embedding::{create_provider, DisabledProvider, EmbeddingProvider};
use crate::extract::{Extractor, PdfTextLayer};
use crate::index::{PolicyIndex, INDEX_FILE};
use crate::ledger::Ledger;
use crate::models::DocumentChunk;
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::progress::{BuildProgressEvent, BuildProgressReporter, ProgressMode};
use crate::resolver::{DeferResolver, MetadataResolver, Resolution, ResolveMode};

/// A file skipped because extraction failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

/// Outcome of one build run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub dry_run: bool,
    pub files_found: usize,
    pub indexed: usize,
    pub failed: Vec<FailedFile>,
    /// Files skipped because they had no ledger entry and the resolver deferred them.
    pub deferred: Vec<String>,
    pub chunks: usize,
    pub ledger_entries: usize,
    /// Ledger entries added by the resolver during this run.
    pub new_entries: usize,
}

/// Resolve, extract, and chunk every file, in order.
///
/// New ledger entries are inserted into `ledger` as soon as they are
/// resolved, so a filename seen twice in one run is only resolved once.
pub fn collect_chunks(
    files: &[DiscoveredPdf],
    ledger: &mut Ledger,
    resolver: &mut dyn MetadataResolver,
    extractor: &Extractor<'_>,
    chunker: &Chunker,
    progress: &dyn BuildProgressReporter,
) -> Result<(Vec<DocumentChunk>, BuildReport)> {
    let mut report = BuildReport {
        files_found: files.len(),
        ..BuildReport::default()
    };
    let mut chunks = Vec::new();
    let total = files.len() as u64;

    for (i, file) in files.iter().enumerate() {
        progress.report(BuildProgressEvent::Extracting {
            filename: file.filename.clone(),
            n: i as u64 + 1,
            total,
        });

        if !ledger.contains(&file.filename) {
            match resolver.resolve(&file.filename)? {
                Resolution::Resolved(record) => {
                    info!(filename = %file.filename, "ledger entry added");
                    ledger.insert(record);
                    report.new_entries += 1;
                }
                Resolution::Deferred => {
                    report.deferred.push(file.filename.clone());
                    continue;
                }
            }
        }

        let record = match ledger.get(&file.filename) {
            Some(record) => record.clone(),
            None => {
                warn!(filename = %file.filename, "resolver returned a record under a different filename");
                report.deferred.push(file.filename.clone());
                continue;
            }
        };

        let text = match extractor.extract_document(&file.path) {
            Ok(text) => text,
            Err(e) => {
                error!(path = %file.path.display(), error = %e, "skipping document");
                report.failed.push(FailedFile {
                    filename: file.relative.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let doc_chunks = chunk_document(chunker, &file.filename, &text, &record);
        if doc_chunks.is_empty() {
            warn!(path = %file.path.display(), "no text extracted");
        }
        report.chunks += doc_chunks.len();
        report.indexed += 1;
        chunks.extend(doc_chunks);
    }

    report.ledger_entries = ledger.len();
    Ok((chunks, report))
}

/// Run a complete build with the given capabilities.
///
/// In a dry run nothing is written and no embeddings are requested.
pub async fn build(
    config: &Config,
    dry_run: bool,
    resolver: &mut dyn MetadataResolver,
    extractor: &Extractor<'_>,
    provider: &dyn EmbeddingProvider,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildReport> {
    let mut ledger = Ledger::load(&config.ledger.path)?;

    progress.report(BuildProgressEvent::Discovering {
        root: config.documents.root.display().to_string(),
    });
    let files = discover_pdfs(&config.documents)?;
    info!(root = %config.documents.root.display(), files = files.len(), "discovered documents");

    let chunker = Chunker::from_config(&config.chunking);
    let (chunks, mut report) =
        collect_chunks(&files, &mut ledger, resolver, extractor, &chunker, progress)?;
    report.dry_run = dry_run;

    if dry_run {
        return Ok(report);
    }

    progress.report(BuildProgressEvent::Saving);
    ledger
        .save(&config.ledger.path)
        .with_context(|| format!("Failed to save ledger: {}", config.ledger.path.display()))?;

    if provider.is_enabled() {
        progress.report(BuildProgressEvent::Embedding {
            chunks: chunks.len() as u64,
        });
    }
    let index = PolicyIndex::build(chunks, provider, config.embedding.batch_size).await?;
    index.save(&config.index.path)?;

    Ok(report)
}

/// `policyctx build`: wire up the real capabilities and print a summary.
pub async fn run_build(
    config: &Config,
    dry_run: bool,
    resolve: ResolveMode,
    progress: ProgressMode,
) -> Result<()> {
    let reporter = progress.reporter();

    let text_layer = PdfTextLayer;
    let tesseract = TesseractOcr::new(&config.ocr);
    let ocr: Option<&dyn OcrEngine> = if config.ocr.enabled {
        Some(&tesseract)
    } else {
        None
    };
    let extractor = Extractor::new(&text_layer, ocr);

    // A dry run never blocks on an operator and never calls the embedding API.
    let mut resolver: Box<dyn MetadataResolver> = if dry_run {
        Box::new(DeferResolver::new())
    } else {
        resolve.resolver()
    };
    let provider: Box<dyn EmbeddingProvider> = if dry_run {
        Box::new(DisabledProvider)
    } else {
        create_provider(&config.embedding)?
    };

    let report = build(
        config,
        dry_run,
        resolver.as_mut(),
        &extractor,
        provider.as_ref(),
        reporter.as_ref(),
    )
    .await?;

    print_report(config, &report);
    Ok(())
}

fn print_report(config: &Config, report: &BuildReport) {
    if report.dry_run {
        println!("build (dry-run)");
    } else {
        println!("build");
    }
    println!("  files found: {}", report.files_found);
    println!("  indexed: {}", report.indexed);
    println!("  failed: {}", report.failed.len());
    for failed in &report.failed {
        println!("    {}: {}", failed.filename, failed.error);
    }
    println!("  deferred: {}", report.deferred.len());
    for filename in &report.deferred {
        println!("    {}", filename);
    }
    println!("  chunks: {}", report.chunks);
    println!(
        "  ledger entries: {} ({} new)",
        report.ledger_entries, report.new_entries
    );
    if !report.dry_run {
        println!("  ledger: {}", config.ledger.path.display());
        println!("  index: {}", config.index.path.join(INDEX_FILE).display());
    }
    println!("ok");
}
