//! Vision Layer
//!
//! QR label decoding and OCR of the printed model number.
//! Supported engines:
//! - rqrr for QR symbols
//! - Tesseract via leptess for text (`tesseract` feature)

pub mod ocr;
pub mod ocr_preprocess;
pub mod qr;
#[cfg(feature = "tesseract")]
pub mod tesseract;

pub use ocr::{NullRecognizer, OcrExtractor, TextRecognizer};
pub use ocr_preprocess::crop_to_roi;
pub use qr::{QrDecoder, RqrrDecoder};

use anyhow::Result;

use crate::config::OcrSettings;

/// Build the text recognizer for this build
pub fn create_recognizer(settings: &OcrSettings) -> Result<Box<dyn TextRecognizer>> {
    #[cfg(feature = "tesseract")]
    let recognizer: Box<dyn TextRecognizer> = Box::new(tesseract::TesseractRecognizer::new(settings)?);

    #[cfg(not(feature = "tesseract"))]
    let recognizer: Box<dyn TextRecognizer> = {
        tracing::warn!(
            "Built without the `tesseract` feature; OCR ({}) will read nothing and every carton will FAIL",
            settings.language
        );
        Box::new(NullRecognizer)
    };

    Ok(recognizer)
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn recognize(&mut self, image: &image::GrayImage) -> Result<String> {
        (**self).recognize(image)
    }
}
