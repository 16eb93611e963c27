//! Core domain types, header formatting, OCR filtering, and slide ripping
//! for turning presentation decks into notes.

pub mod error;
pub mod format;
pub mod normalize;
pub mod ocr;
pub mod ripper;
pub mod types;

pub use error::{Error, Result};
pub use format::OutputFormat;
pub use normalize::TextNormalizer;
pub use ocr::{filter_confident, OcrEngine, OcrWord, DEFAULT_CONFIDENCE_THRESHOLD};
pub use ripper::{media_folder_for, rip_slides, PresentationSource, RipStats, SlideRipper};
pub use types::{
    ExtractedSlide, ImageBlob, PictureData, Presentation, PresentationFormat, ShapeKind,
    SlideShape,
};
