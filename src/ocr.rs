//! OCR for pages with no text layer.
//!
//! [`TesseractOcr`] shells out to poppler's `pdftoppm` to rasterize a
//! single page, then to `tesseract` to recognize it. Both run
//! synchronously; the build waits for each page.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::extract::ExtractError;

/// Recognizes the text of one page (1-based) of a PDF file.
pub trait OcrEngine {
    fn recognize_page(&self, pdf: &Path, page_number: usize) -> Result<String, ExtractError>;
}

pub struct TesseractOcr {
    tesseract_cmd: String,
    pdftoppm_cmd: String,
    dpi: u32,
    language: String,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            tesseract_cmd: config.tesseract_cmd.clone(),
            pdftoppm_cmd: config.pdftoppm_cmd.clone(),
            dpi: config.dpi,
            language: config.language.clone(),
        }
    }

    fn rasterize(
        &self,
        pdf: &Path,
        page_number: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, ExtractError> {
        let prefix = out_dir.join("page");
        let page = page_number.to_string();
        let output = Command::new(&self.pdftoppm_cmd)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg("-png")
            .arg("-singlefile")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                ExtractError::Ocr(format!(
                    "failed to run {} (is poppler installed?): {}",
                    self.pdftoppm_cmd, e
                ))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "{} failed on page {}: {}",
                self.pdftoppm_cmd,
                page_number,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(prefix.with_extension("png"))
    }

    fn recognize_image(&self, image: &Path) -> Result<String, ExtractError> {
        let output = Command::new(&self.tesseract_cmd)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| {
                ExtractError::Ocr(format!(
                    "failed to run {} (is tesseract installed?): {}",
                    self.tesseract_cmd, e
                ))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "{} failed: {}",
                self.tesseract_cmd,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_page(&self, pdf: &Path, page_number: usize) -> Result<String, ExtractError> {
        let scratch = tempfile::tempdir()?;
        let image = self.rasterize(pdf, page_number, scratch.path())?;
        let text = self.recognize_image(&image)?;
        debug!(
            path = %pdf.display(),
            page = page_number,
            dpi = self.dpi,
            chars = text.chars().count(),
            "OCR complete"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_ocr_error() {
        let ocr = TesseractOcr::new(&OcrConfig {
            pdftoppm_cmd: "pdftoppm-not-installed-anywhere".to_string(),
            ..OcrConfig::default()
        });
        let err = ocr
            .recognize_page(Path::new("whatever.pdf"), 1)
            .unwrap_err();
        match err {
            ExtractError::Ocr(msg) => assert!(msg.contains("pdftoppm-not-installed-anywhere")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
