//! Tesseract OCR backend (via leptess)

use anyhow::{Context, Result};
use image::GrayImage;
use leptess::{LepTess, Variable};
use tracing::info;

use super::ocr::TextRecognizer;
use crate::config::OcrSettings;

/// Tesseract engine configured for a single block of text
pub struct TesseractRecognizer {
    tesseract: LepTess,
}

impl TesseractRecognizer {
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        let mut tesseract = LepTess::new(None, &settings.language)
            .context("Failed to initialize Tesseract. Is Tesseract installed?")?;

        tesseract
            .set_variable(Variable::TesseditPagesegMode, &settings.page_seg_mode.to_string())
            .context("Failed to set page segmentation mode")?;

        info!(
            "Tesseract initialized (language: {}, psm: {})",
            settings.language, settings.page_seg_mode
        );
        Ok(Self { tesseract })
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&mut self, image: &GrayImage) -> Result<String> {
        // leptess takes encoded images
        let mut png_bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .context("Failed to encode image as PNG")?;

        self.tesseract
            .set_image_from_mem(&png_bytes)
            .context("Failed to load image into Tesseract")?;

        self.tesseract
            .get_utf8_text()
            .context("Failed to extract text from image")
    }
}
