//! OCR backends for reading text out of slide images.

pub mod tesseract;

pub use tesseract::{parse_tsv, TesseractEngine};
