use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use tracing::debug;

use super::{ExtractionConfig, PageSource};

const POINTS_PER_INCH: f32 = 72.0;

/// Bind to the pdfium library named in the configuration, or the system one
#[inline]
pub fn load_pdfium(config: &ExtractionConfig) -> Result<Pdfium> {
    let bindings = match &config.pdfium_library {
        Some(path) => Pdfium::bind_to_library(path)
            .map_err(|e| anyhow!("Failed to load pdfium from {}: {:?}", path.display(), e))?,
        None => Pdfium::bind_to_system_library()
            .map_err(|e| anyhow!("Failed to load the system pdfium library: {:?}", e))?,
    };

    Ok(Pdfium::new(bindings))
}

/// PDF document opened through pdfium
pub struct PdfDocumentSource<'a> {
    document: PdfDocument<'a>,
    name: Option<String>,
}

impl<'a> PdfDocumentSource<'a> {
    #[inline]
    pub fn from_bytes(pdfium: &'a Pdfium, bytes: &'a [u8], name: Option<String>) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| anyhow!("Failed to open PDF: {:?}", e))?;

        debug!(
            "Opened PDF {:?} with {} pages",
            name,
            document.pages().len()
        );

        Ok(Self { document, name })
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>> {
        let page_index = index
            .try_into()
            .with_context(|| format!("Page index {index} out of range"))?;
        self.document
            .pages()
            .get(page_index)
            .map_err(|e| anyhow!("Failed to load page {}: {:?}", index + 1, e))
    }
}

impl PageSource for PdfDocumentSource<'_> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn native_text(&self, index: usize) -> Result<String> {
        let page = self.page(index)?;
        let text = page
            .text()
            .map_err(|e| anyhow!("Failed to read text layer of page {}: {:?}", index + 1, e))?;
        Ok(text.all())
    }

    fn render(&self, index: usize, dpi: u32) -> Result<DynamicImage> {
        let page = self.page(index)?;

        let scale = dpi as f32 / POINTS_PER_INCH;
        let width = (page.width().value * scale).round() as i32;
        let height = (page.height().value * scale).round() as i32;

        let config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_maximum_height(height);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| anyhow!("Failed to render page {}: {:?}", index + 1, e))?;

        let pixels = bitmap.as_rgba_bytes();
        let image = RgbaImage::from_raw(bitmap.width() as u32, bitmap.height() as u32, pixels)
            .context("Rendered bitmap has an unexpected size")?;

        debug!(
            "Rendered page {} at {} DPI ({}x{})",
            index + 1,
            dpi,
            image.width(),
            image.height()
        );

        Ok(DynamicImage::ImageRgba8(image))
    }
}
