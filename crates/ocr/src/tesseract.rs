//! Tesseract command-line engine.
//!
//! Images are written to a temporary file and passed to the `tesseract`
//! binary, which prints word boxes as TSV on stdout.

use ripper_core::{Error, ImageBlob, OcrEngine, OcrWord, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// TSV row level for a single word.
const WORD_LEVEL: u32 = 5;

/// Number of columns in a Tesseract TSV row.
const TSV_COLUMNS: usize = 12;

/// OCR engine backed by the `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
    language: String,
    psm: Option<u8>,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self {
            command: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            psm: None,
        }
    }
}

impl TesseractEngine {
    /// Create an engine that runs `tesseract` from `PATH` with English.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `tesseract` executable.
    pub fn with_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.command = command.into();
        self
    }

    /// Set the language code(s), e.g. `eng` or `eng+deu`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the page segmentation mode.
    pub fn with_psm(mut self, psm: Option<u8>) -> Self {
        self.psm = psm;
        self
    }

    /// Check whether the executable can be run.
    pub fn is_available(&self) -> bool {
        let available = Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if !available {
            log::debug!(
                "{} not found - install tesseract-ocr for OCR support",
                self.command.display()
            );
        }

        available
    }

    fn run(&self, image: &ImageBlob) -> Result<String> {
        let mut input = tempfile::Builder::new()
            .prefix("slide-ripper-")
            .suffix(&format!(".{}", image.ext))
            .tempfile()?;
        input.write_all(&image.bytes)?;
        input.flush()?;

        let mut command = Command::new(&self.command);
        command.arg(input.path()).arg("stdout").arg("-l").arg(&self.language);
        if let Some(psm) = self.psm {
            command.arg("--psm").arg(psm.to_string());
        }
        command.arg("tsv");

        let output = command.output().map_err(|e| {
            Error::OcrError(format!("Failed to run {}: {}", self.command.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::OcrError(format!(
                "tesseract failed on {} image: {}",
                image.ext,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &ImageBlob) -> Result<Vec<OcrWord>> {
        if let Some(content_type) = &image.content_type {
            if !is_raster_type(content_type) {
                return Err(Error::OcrError(format!(
                    "{} images cannot be read by tesseract",
                    content_type
                )));
            }
        }
        let tsv = self.run(image)?;
        Ok(parse_tsv(&tsv))
    }
}

/// Vector formats (EMF, WMF, SVG) are rejected before tesseract sees them.
fn is_raster_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.starts_with("image/")
        && !matches!(
            content_type.as_str(),
            "image/x-emf" | "image/emf" | "image/x-wmf" | "image/wmf" | "image/svg+xml"
        )
}

/// Parse Tesseract TSV output into word rows.
///
/// Rows above word level (pages, blocks, lines) are dropped. Rows that do not
/// have the expected columns are skipped with a debug log.
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for (line_no, line) in tsv.lines().enumerate() {
        if line_no == 0 && line.starts_with("level") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let columns: Vec<&str> = line.splitn(TSV_COLUMNS, '\t').collect();
        if columns.len() < TSV_COLUMNS - 1 {
            log::debug!("Skipping short TSV row {}: {:?}", line_no + 1, line);
            continue;
        }

        let Ok(level) = columns[0].trim().parse::<u32>() else {
            log::debug!("Skipping TSV row {} with bad level", line_no + 1);
            continue;
        };
        if level != WORD_LEVEL {
            continue;
        }

        let confidence = columns[10].trim().parse::<f32>().unwrap_or(-1.0);
        let text = columns.get(11).copied().unwrap_or("");
        words.push(OcrWord::new(text, confidence));
    }

    words
}
