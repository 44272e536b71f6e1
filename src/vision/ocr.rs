//! OCR (Optical Character Recognition) module
//!
//! Reads the printed model number from the cropped OCR camera region.

use anyhow::Result;
use image::{GrayImage, RgbImage};
use tracing::{debug, info};

use super::ocr_preprocess::prepare_for_ocr;

/// Text recognition engine
pub trait TextRecognizer {
    /// Recognize text in a binarized image, treating it as one uniform block
    fn recognize(&mut self, image: &GrayImage) -> Result<String>;
}

/// Recognizer used when no OCR engine is compiled in; always reads nothing
pub struct NullRecognizer;

impl TextRecognizer for NullRecognizer {
    fn recognize(&mut self, _image: &GrayImage) -> Result<String> {
        Ok(String::new())
    }
}

/// Binarize, recognize, normalize
pub struct OcrExtractor<R> {
    recognizer: R,
    threshold: u8,
}

impl<R: TextRecognizer> OcrExtractor<R> {
    pub fn with_threshold(recognizer: R, threshold: u8) -> Self {
        Self { recognizer, threshold }
    }

    /// Extract normalized text from a cropped region.
    ///
    /// Whatever the recognizer returns is accepted, including nothing.
    pub fn extract(&mut self, cropped: &RgbImage) -> Result<String> {
        if cropped.width() == 0 || cropped.height() == 0 {
            debug!("Empty OCR region, nothing to read");
            return Ok(String::new());
        }

        let binary = prepare_for_ocr(cropped, self.threshold);
        let raw = self.recognizer.recognize(&binary)?;
        let text = normalize_text(&raw);

        info!("Extracted Text: {}", text);
        Ok(text)
    }
}

/// Trim and drop every whitespace character, including those between words
pub fn normalize_text(raw: &str) -> String {
    raw.trim().chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Returns queued raw readings in order, then empty strings
    pub struct ScriptedRecognizer {
        pub readings: VecDeque<String>,
        pub seen: Vec<(u32, u32)>,
    }

    impl ScriptedRecognizer {
        pub fn new(readings: &[&str]) -> Self {
            Self {
                readings: readings.iter().map(|s| s.to_string()).collect(),
                seen: Vec::new(),
            }
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&mut self, image: &GrayImage) -> Result<String> {
            self.seen.push(image.dimensions());
            Ok(self.readings.pop_front().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRecognizer;
    use super::*;
    use crate::vision::ocr_preprocess::DEFAULT_THRESHOLD;
    use image::Rgb;

    /// Records what the engine was given
    struct InspectingRecognizer {
        pixels: Vec<u8>,
    }

    impl TextRecognizer for InspectingRecognizer {
        fn recognize(&mut self, image: &GrayImage) -> Result<String> {
            self.pixels = image.pixels().map(|p| p.0[0]).collect();
            Ok("ok".to_string())
        }
    }

    #[test]
    fn test_normalize_strips_all_whitespace() {
        assert_eq!(normalize_text("MODEL 123\n"), "MODEL123");
        assert_eq!(normalize_text("  AB CD\nEF \r\n"), "ABCDEF");
        assert_eq!(normalize_text("A\tB"), "AB");
        assert_eq!(normalize_text(" \n "), "");
    }

    #[test]
    fn test_extract_normalizes_recognizer_output() {
        let mut extractor = OcrExtractor::with_threshold(ScriptedRecognizer::new(&["MODEL 123\n"]), DEFAULT_THRESHOLD);
        let crop = RgbImage::from_pixel(20, 10, Rgb([255, 255, 255]));

        assert_eq!(extractor.extract(&crop).unwrap(), "MODEL123");
    }

    #[test]
    fn test_extract_accepts_empty_reading() {
        let mut extractor = OcrExtractor::with_threshold(ScriptedRecognizer::new(&[]), DEFAULT_THRESHOLD);
        let crop = RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]));

        assert_eq!(extractor.extract(&crop).unwrap(), "");
    }

    #[test]
    fn test_extract_feeds_binarized_image() {
        let mut extractor = OcrExtractor::with_threshold(InspectingRecognizer { pixels: vec![] }, DEFAULT_THRESHOLD);
        let crop = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([100, 100, 100]) } else { Rgb([200, 200, 200]) });

        extractor.extract(&crop).unwrap();
        assert_eq!(extractor.recognizer.pixels, vec![0, 255]);
    }

    #[test]
    fn test_extract_skips_empty_region() {
        let mut extractor = OcrExtractor::with_threshold(ScriptedRecognizer::new(&["SHOULD NOT READ"]), DEFAULT_THRESHOLD);

        assert_eq!(extractor.extract(&RgbImage::new(0, 0)).unwrap(), "");
        assert!(extractor.recognizer.seen.is_empty());
    }
}
