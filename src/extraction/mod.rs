// Page extraction module
// Turns one document page into plain text, falling back to OCR for scanned pages


pub mod ocr;
pub mod pdf;

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

pub use ocr::TesseractOcr;
pub use pdf::{PdfDocumentSource, load_pdfium};

/// Native text shorter than this (after trimming) is treated as a failed extraction
pub const DEFAULT_MIN_NATIVE_CHARS: usize = 50;
/// Resolution used when rasterising a page for OCR
pub const DEFAULT_OCR_DPI: u32 = 300;

/// A page-addressable document
pub trait PageSource {
    /// Human readable name of the document, used in the manifest
    fn name(&self) -> Option<&str> {
        None
    }

    fn page_count(&self) -> usize;

    /// Text embedded in the page itself, without OCR
    fn native_text(&self, index: usize) -> Result<String>;

    /// Rasterise the page at the given resolution
    fn render(&self, index: usize, dpi: u32) -> Result<DynamicImage>;
}

/// Optical character recognition over a rendered page
pub trait OcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub min_native_chars: usize,
    pub ocr_dpi: u32,
    pub ocr_enabled: bool,
    pub tesseract_command: String,
    pub ocr_language: String,
    /// Explicit path to the pdfium shared library; the system library is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_native_chars: DEFAULT_MIN_NATIVE_CHARS,
            ocr_dpi: DEFAULT_OCR_DPI,
            ocr_enabled: true,
            tesseract_command: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            pdfium_library: None,
        }
    }
}

/// Non-fatal problem encountered while extracting a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWarning {
    /// 1-based page number
    pub page_number: usize,
    pub message: String,
}

/// Text extracted from one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page_number: usize,
    pub text: String,
    pub ocr_used: bool,
    pub warning: Option<PageWarning>,
}

pub struct PageExtractor {
    min_native_chars: usize,
    ocr_dpi: u32,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl PageExtractor {
    #[inline]
    pub fn new(config: &ExtractionConfig, ocr: Option<Box<dyn OcrEngine>>) -> Self {
        Self {
            min_native_chars: config.min_native_chars,
            ocr_dpi: config.ocr_dpi,
            ocr,
        }
    }

    /// Build the extractor described by the configuration, with tesseract when OCR is enabled
    #[inline]
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let ocr: Option<Box<dyn OcrEngine>> = config
            .ocr_enabled
            .then(|| Box::new(TesseractOcr::new(config)) as Box<dyn OcrEngine>);
        Self::new(config, ocr)
    }

    #[inline]
    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Extract the text of page `index` (0-based)
    ///
    /// Native text is used when it holds at least `min_native_chars` characters. Otherwise the
    /// page is rendered and passed through OCR; the OCR output replaces the native text only
    /// when it is non-blank. OCR failures are reported as a warning and never abort.
    #[inline]
    pub fn extract(&self, source: &dyn PageSource, index: usize) -> PageText {
        let page_number = index + 1;

        let mut warning = None;
        let native = match source.native_text(index) {
            Ok(text) => text,
            Err(e) => {
                warn!("Native text extraction failed on page {}: {:#}", page_number, e);
                warning = Some(PageWarning {
                    page_number,
                    message: format!("native text extraction failed: {e:#}"),
                });
                String::new()
            }
        };

        let native_len = native.trim().chars().count();
        if native_len >= self.min_native_chars {
            debug!("Page {}: {} chars of native text", page_number, native_len);
            return PageText {
                page_number,
                text: native,
                ocr_used: false,
                warning,
            };
        }

        let Some(ocr) = &self.ocr else {
            debug!(
                "Page {}: native text below threshold and OCR is disabled",
                page_number
            );
            return PageText {
                page_number,
                text: native,
                ocr_used: false,
                warning,
            };
        };

        debug!(
            "Page {}: only {} chars of native text, running OCR at {} DPI",
            page_number, native_len, self.ocr_dpi
        );

        let recognized = source
            .render(index, self.ocr_dpi)
            .and_then(|image| ocr.recognize(&image));

        match recognized {
            Ok(text) if !text.trim().is_empty() => PageText {
                page_number,
                text,
                ocr_used: true,
                warning,
            },
            Ok(_) => {
                debug!("Page {}: OCR produced no text", page_number);
                PageText {
                    page_number,
                    text: native,
                    ocr_used: false,
                    warning,
                }
            }
            Err(e) => {
                warn!("OCR failed on page {}: {:#}", page_number, e);
                PageText {
                    page_number,
                    text: native,
                    ocr_used: false,
                    warning: Some(PageWarning {
                        page_number,
                        message: format!("OCR failed: {e:#}"),
                    }),
                }
            }
        }
    }
}
