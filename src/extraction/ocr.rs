use anyhow::{Context, Result, bail};
use image::{DynamicImage, ImageFormat};
use std::process::Command;
use tracing::debug;

use super::{ExtractionConfig, OcrEngine};

/// OCR through the `tesseract` command line tool
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    #[inline]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            command: config.tesseract_command.clone(),
            language: config.ocr_language.clone(),
        }
    }

    /// Version line reported by the tesseract binary, if it can be run at all
    #[inline]
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.command).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }

        // Older releases print the version banner on stderr
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let input = tempfile::Builder::new()
            .prefix("docqa-page-")
            .suffix(".png")
            .tempfile()
            .context("Failed to create temporary image file")?;

        image
            .save_with_format(input.path(), ImageFormat::Png)
            .context("Failed to write page image for OCR")?;

        debug!(
            "Running {} on {}x{} image",
            self.command,
            image.width(),
            image.height()
        );

        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .with_context(|| format!("Failed to run OCR command '{}'", self.command))?;

        if !output.status.success() {
            bail!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
