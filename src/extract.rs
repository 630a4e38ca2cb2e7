//! PDF text extraction with per-page OCR fallback.
//!
//! Each page is read from the PDF text layer first. Pages whose text layer
//! is empty (scanned pages, image-only forms) are rasterized and passed
//! through an [`OcrEngine`]. Page outputs are joined into one text blob
//! per document.
//!
//! Both capabilities sit behind traits so the pipeline can be exercised
//! without poppler or tesseract installed.

use std::path::Path;
use tracing::debug;

use crate::ocr::OcrEngine;

/// Extraction error. The build logs it and skips the document.
#[derive(Debug)]
pub enum ExtractError {
    Io(std::io::Error),
    Pdf(String),
    Ocr(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ocr(e) => write!(f, "OCR failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError::Io(e)
    }
}

/// Reads the embedded text layer of a PDF, one string per page.
pub trait TextLayer {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// Text layer backed by `pdf-extract`.
pub struct PdfTextLayer;

impl TextLayer for PdfTextLayer {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        // pdf-extract panics on some malformed inputs instead of erroring.
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
            Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
            Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
        }
    }
}

/// Per-document extraction: text layer first, OCR for empty pages.
pub struct Extractor<'a> {
    text_layer: &'a dyn TextLayer,
    /// `None` disables the OCR fallback; empty pages then contribute nothing.
    ocr: Option<&'a dyn OcrEngine>,
}

impl<'a> Extractor<'a> {
    pub fn new(text_layer: &'a dyn TextLayer, ocr: Option<&'a dyn OcrEngine>) -> Self {
        Self { text_layer, ocr }
    }

    /// Extract the full text of one PDF.
    ///
    /// Each non-empty page is followed by a newline. Any failure, on any
    /// page, fails the whole document.
    pub fn extract_document(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let pages = self.text_layer.page_texts(&bytes)?;

        let mut full_text = String::new();
        for (index, page) in pages.iter().enumerate() {
            let page_number = index + 1;
            let text = if page.trim().is_empty() {
                match self.ocr {
                    Some(ocr) => {
                        debug!(path = %path.display(), page = page_number, "text layer empty, running OCR");
                        ocr.recognize_page(path, page_number)?
                    }
                    None => String::new(),
                }
            } else {
                page.clone()
            };

            if !text.is_empty() {
                full_text.push_str(&text);
                full_text.push('\n');
            }
        }
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Write;

    struct FixedPages(Vec<&'static str>);

    impl TextLayer for FixedPages {
        fn page_texts(&self, _bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[derive(Default)]
    struct RecordingOcr {
        calls: RefCell<Vec<usize>>,
    }

    impl OcrEngine for RecordingOcr {
        fn recognize_page(&self, _pdf: &Path, page_number: usize) -> Result<String, ExtractError> {
            self.calls.borrow_mut().push(page_number);
            Ok(format!("scanned page {}", page_number))
        }
    }

    struct BrokenOcr;

    impl OcrEngine for BrokenOcr {
        fn recognize_page(&self, _pdf: &Path, _page_number: usize) -> Result<String, ExtractError> {
            Err(ExtractError::Ocr("tesseract exited with 1".to_string()))
        }
    }

    fn some_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4").unwrap();
        f
    }

    #[test]
    fn ocr_only_runs_for_empty_pages() {
        let file = some_file();
        let layer = FixedPages(vec!["first page", "  \n", "third page"]);
        let ocr = RecordingOcr::default();
        let text = Extractor::new(&layer, Some(&ocr))
            .extract_document(file.path())
            .unwrap();

        assert_eq!(text, "first page\nscanned page 2\nthird page\n");
        assert_eq!(*ocr.calls.borrow(), vec![2]);
    }

    #[test]
    fn ocr_disabled_drops_empty_pages() {
        let file = some_file();
        let layer = FixedPages(vec!["", "only text"]);
        let text = Extractor::new(&layer, None)
            .extract_document(file.path())
            .unwrap();
        assert_eq!(text, "only text\n");
    }

    #[test]
    fn ocr_failure_fails_document() {
        let file = some_file();
        let layer = FixedPages(vec!["ok", ""]);
        let err = Extractor::new(&layer, Some(&BrokenOcr))
            .extract_document(file.path())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let layer = FixedPages(vec![]);
        let err = Extractor::new(&layer, None)
            .extract_document(Path::new("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = PdfTextLayer.page_texts(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
