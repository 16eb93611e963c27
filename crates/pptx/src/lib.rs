//! PPTX (Office Open XML) reader backend for slide ripping.
//!
//! Reads .pptx files, which are ZIP archives of XML parts, into the
//! slide and shape model from `ripper-core`.

mod package;
pub mod parser;

pub use parser::PptxParser;
