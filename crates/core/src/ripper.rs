//! Slide ripping: walks a presentation and writes notes to an output stream.
//!
//! For every slide a header is written, followed by the text of each text
//! frame in shape order. Pictures can be saved to a `<stem>_Media` folder next
//! to the source file and run through OCR. A picture that fails to save or
//! read is logged and skipped; it never aborts the slide.

use crate::ocr::{extract_text_with_confidence, OcrEngine, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::{
    ExtractedSlide, ImageBlob, OutputFormat, PictureData, Presentation, Result, ShapeKind,
    TextNormalizer,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Marker written before text read out of an image.
const IMAGE_READ_MARKER: &str = "[IMAGE READ]:";

/// Marker written before speaker notes.
const NOTES_MARKER: &str = "[NOTES]:";

/// Anything that can open a presentation file into the domain model.
pub trait PresentationSource {
    /// Open and parse the presentation at `path`.
    fn open(&self, path: &Path) -> Result<Presentation>;
}

/// Counters collected while ripping one presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipStats {
    /// Slides written.
    pub slides: usize,
    /// Text frames written.
    pub text_frames: usize,
    /// Picture shapes seen.
    pub images: usize,
    /// Pictures written to the media folder.
    pub images_saved: usize,
    /// OCR results that produced text and were written.
    pub ocr_blocks: usize,
    /// Pictures that failed to save or read.
    pub image_errors: usize,
}

impl RipStats {
    /// Add another file's counters to this one.
    pub fn merge(&mut self, other: &RipStats) {
        self.slides += other.slides;
        self.text_frames += other.text_frames;
        self.images += other.images;
        self.images_saved += other.images_saved;
        self.ocr_blocks += other.ocr_blocks;
        self.image_errors += other.image_errors;
    }
}

/// Writes the notes for a presentation.
#[derive(Clone)]
pub struct SlideRipper<'a> {
    format: OutputFormat,
    normalizer: TextNormalizer,
    save_images: bool,
    ocr: Option<&'a dyn OcrEngine>,
    ocr_threshold: i32,
    include_notes: bool,
}

impl<'a> SlideRipper<'a> {
    /// Create a ripper for the given output format with images and OCR off.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            normalizer: TextNormalizer::new(),
            save_images: false,
            ocr: None,
            ocr_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            include_notes: false,
        }
    }

    /// Set the text normalizer used for text frames.
    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Save picture blobs to the media folder beside the source file.
    pub fn with_save_images(mut self, save: bool) -> Self {
        self.save_images = save;
        self
    }

    /// Run pictures through an OCR engine. `None` disables OCR.
    pub fn with_ocr(mut self, engine: Option<&'a dyn OcrEngine>) -> Self {
        self.ocr = engine;
        self
    }

    /// Minimum OCR confidence (exclusive) for a word to be kept.
    pub fn with_ocr_threshold(mut self, threshold: i32) -> Self {
        self.ocr_threshold = threshold;
        self
    }

    /// Write speaker notes after each slide's shapes.
    pub fn with_include_notes(mut self, include: bool) -> Self {
        self.include_notes = include;
        self
    }

    /// The output format this ripper writes.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write notes for `presentation`, read from `source_path`, into `out`.
    ///
    /// `progress` is called with `(slide_number, total_slides)` after each slide.
    pub fn rip<W: Write + ?Sized>(
        &self,
        presentation: &Presentation,
        source_path: &Path,
        out: &mut W,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<RipStats> {
        let filename = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&presentation.filename);
        out.write_all(self.format.source_header(filename).as_bytes())?;

        let media_folder = media_folder_for(source_path);
        if self.save_images && !media_folder.exists() {
            log::debug!("Creating media folder {}", media_folder.display());
            fs::create_dir_all(&media_folder)?;
        }

        let mut stats = RipStats::default();
        let total = presentation.slides.len();

        for (idx, slide) in presentation.slides.iter().enumerate() {
            let number = idx + 1;
            log::debug!("Processing slide {}", number);
            self.rip_slide(slide, number, &media_folder, out, &mut stats)?;
            stats.slides += 1;
            progress(number, total);
        }

        out.flush()?;
        Ok(stats)
    }

    fn rip_slide<W: Write + ?Sized>(
        &self,
        slide: &ExtractedSlide,
        number: usize,
        media_folder: &Path,
        out: &mut W,
        stats: &mut RipStats,
    ) -> Result<()> {
        out.write_all(self.format.slide_header(number).as_bytes())?;

        let mut img_count = 0;

        for shape in &slide.shapes {
            match &shape.kind {
                ShapeKind::Text(text) => {
                    writeln!(out, "{}", self.normalizer.normalize(text))?;
                    stats.text_frames += 1;
                }
                ShapeKind::Picture(picture) => {
                    img_count += 1;
                    stats.images += 1;

                    match self.process_picture(picture, number, img_count, media_folder, stats) {
                        Ok(Some(text)) => {
                            write!(out, "\n\n{}\n{}\n", IMAGE_READ_MARKER, text)?;
                            stats.ocr_blocks += 1;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            log::warn!("Could not read image on slide {}: {}", number, e);
                            stats.image_errors += 1;
                        }
                    }
                }
                ShapeKind::Other => {}
            }
        }

        if self.include_notes {
            if let Some(notes) = slide.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                write!(
                    out,
                    "\n{}\n{}\n",
                    NOTES_MARKER,
                    self.normalizer.normalize(notes)
                )?;
            }
        }

        Ok(())
    }

    /// Save and/or OCR one picture. Returns OCR text worth writing, if any.
    fn process_picture(
        &self,
        picture: &PictureData,
        slide_number: usize,
        img_count: usize,
        media_folder: &Path,
        stats: &mut RipStats,
    ) -> Result<Option<String>> {
        let blob = picture.image()?;

        if self.save_images {
            let img_path = media_folder.join(image_filename(slide_number, img_count, blob));
            fs::write(&img_path, &blob.bytes)?;
            stats.images_saved += 1;
            log::debug!("Saved image to {}", img_path.display());
        }

        if let Some(engine) = self.ocr {
            let text = extract_text_with_confidence(engine, blob, self.ocr_threshold)?;
            if !text.trim().is_empty() {
                return Ok(Some(text));
            }
        }

        Ok(None)
    }
}

/// The `<stem>_Media` folder next to a source file.
pub fn media_folder_for(source_path: &Path) -> PathBuf {
    let stem = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("presentation");
    let parent = source_path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{}_Media", stem))
}

/// File name for the `img_count`-th picture on a slide.
fn image_filename(slide_number: usize, img_count: usize, blob: &ImageBlob) -> String {
    format!("Slide_{}_Image_{}.{}", slide_number, img_count, blob.ext)
}

/// Open `path` with `source` and write its notes into `out`.
///
/// A path that does not exist is skipped with a warning and nothing is written.
pub fn rip_slides<W: Write + ?Sized>(
    source: &dyn PresentationSource,
    path: &Path,
    out: &mut W,
    ripper: &SlideRipper<'_>,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<RipStats> {
    if !path.exists() {
        log::warn!("Skipping {}: file does not exist", path.display());
        return Ok(RipStats::default());
    }

    log::info!("Opening {}...", path.display());
    let presentation = source.open(path)?;
    ripper.rip(&presentation, path, out, progress)
}
