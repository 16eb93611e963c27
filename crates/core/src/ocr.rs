//! OCR engine interface and confidence filtering.
//!
//! Engines report every word they see along with a confidence score. Only
//! words scoring above a threshold make it into the notes.

use crate::{ImageBlob, Result};

/// Default minimum confidence (exclusive) for an OCR word to be kept.
pub const DEFAULT_CONFIDENCE_THRESHOLD: i32 = 60;

/// A single word reported by an OCR engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    /// The recognized text. May be empty or whitespace for layout rows.
    pub text: String,

    /// Confidence from 0 to 100. Negative for rows that are not words.
    pub confidence: f32,
}

impl OcrWord {
    /// Create a new OCR word.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Trait that OCR backends implement.
pub trait OcrEngine: Send + Sync {
    /// Short engine identifier used in logs.
    fn name(&self) -> &'static str;

    /// Recognize every word in an image.
    fn recognize(&self, image: &ImageBlob) -> Result<Vec<OcrWord>>;
}

/// Keep only confident, non-blank words and join them with single spaces.
///
/// Confidence is truncated to a whole number before the strict comparison,
/// so a word at 60.9 does not pass a threshold of 60.
pub fn filter_confident(words: &[OcrWord], threshold: i32) -> String {
    words
        .iter()
        .filter(|w| (w.confidence as i32) > threshold)
        .filter(|w| !w.text.trim().is_empty())
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recognize an image and return only its confident text.
pub fn extract_text_with_confidence(
    engine: &dyn OcrEngine,
    image: &ImageBlob,
    threshold: i32,
) -> Result<String> {
    let words = engine.recognize(image)?;
    log::debug!(
        "{} reported {} words for a {}-byte {} image",
        engine.name(),
        words.len(),
        image.bytes.len(),
        image.ext
    );
    Ok(filter_confident(&words, threshold))
}
