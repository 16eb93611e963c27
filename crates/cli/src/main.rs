//! CLI tool for ripping notes out of PowerPoint slide decks.

mod batch;

use anyhow::{Context, Result};
use batch::{display_name, BatchJob, BatchReport, MergeMode, Progress};
use clap::Parser;
use ripper_core::{
    OcrEngine, OutputFormat, SlideRipper, TextNormalizer, DEFAULT_CONFIDENCE_THRESHOLD,
};
use ripper_ocr::TesseractEngine;
use ripper_pptx::PptxParser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

/// Extract slide text (and optionally image text and images) into notes.
#[derive(Parser, Debug)]
#[command(name = "slide-ripper")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PowerPoint file(s) (.pptx)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "txt", value_parser = parse_format)]
    format: OutputFormat,

    /// Combine all inputs into one notes file, or write one per input
    #[arg(short, long, value_enum, default_value_t = MergeMode::Combine)]
    mode: MergeMode,

    /// Output directory (default: beside the input files)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save every picture to a <name>_Media folder beside its presentation
    #[arg(short, long)]
    images: bool,

    /// Read text out of pictures with Tesseract OCR
    #[arg(long)]
    ocr: bool,

    /// Minimum OCR word confidence (exclusive, 0-100)
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    ocr_threshold: i32,

    /// Path to the tesseract executable
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// Tesseract language code(s), e.g. eng or eng+deu
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode
    #[arg(long)]
    psm: Option<u8>,

    /// Include speaker notes after each slide
    #[arg(short, long)]
    notes: bool,

    /// Read shapes nested inside groups
    #[arg(long)]
    groups: bool,

    /// Collapse runs of spaces and tabs in slide text
    #[arg(long)]
    collapse_whitespace: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_format(s: &str) -> std::result::Result<OutputFormat, String> {
    s.parse().map_err(|e: ripper_core::Error| e.to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = default_log_filter(args.verbose, args.quiet);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let engine = if args.ocr {
        let engine = TesseractEngine::new()
            .with_command(&args.tesseract)
            .with_language(&args.lang)
            .with_psm(args.psm);
        if !engine.is_available() {
            anyhow::bail!(
                "OCR requested but {} could not be run; install Tesseract or pass --tesseract",
                args.tesseract.display()
            );
        }
        Some(engine)
    } else {
        None
    };

    let parser = PptxParser::new()
        .with_descend_groups(args.groups)
        .with_notes(args.notes);

    let ripper = SlideRipper::new(args.format)
        .with_normalizer(TextNormalizer::new().with_collapse_whitespace(args.collapse_whitespace))
        .with_save_images(args.images)
        .with_ocr(engine.as_ref().map(|e| e as &dyn OcrEngine))
        .with_ocr_threshold(args.ocr_threshold)
        .with_include_notes(args.notes);

    let job = BatchJob::new(args.input.clone(), args.mode).with_output_dir(args.output.clone());
    if !args.quiet {
        eprintln!("{} files selected.", job.inputs().len());
    }

    // The batch runs on a worker so file I/O and OCR never block progress output
    let (tx, rx) = mpsc::channel();
    let report = thread::scope(|scope| {
        let worker = scope.spawn(|| {
            let tx = tx;
            job.run(&parser, &ripper, &tx)
        });

        for event in rx {
            render_progress(&event, args.mode, args.quiet);
        }

        worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))?
    })?;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        if args.verbose {
            eprintln!("Report written to: {}", path.display());
        }
    }

    let failures = report.failures();
    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, report.files.len());
    }

    Ok(())
}

/// Log level used when `RUST_LOG` is not set.
fn default_log_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    }
}

/// Print one progress event to stderr.
fn render_progress(event: &Progress, mode: MergeMode, quiet: bool) {
    match event {
        Progress::FileFailed { path, error } => {
            eprintln!("ERROR: {}: {}", path.display(), error);
        }
        _ if quiet => {}
        Progress::OutputOpened { path } => {
            if mode == MergeMode::Combine {
                eprintln!("Merging all into {}...", display_name(path));
            } else {
                log::debug!("Writing {}", path.display());
            }
        }
        Progress::FileStarted { index, total, path } => match mode {
            MergeMode::Separate => {
                eprintln!("[{}/{}] Processing: {}...", index, total, display_name(path))
            }
            MergeMode::Combine => {
                eprintln!("[{}/{}] Appending {}...", index, total, display_name(path))
            }
        },
        Progress::Slide { current, total } => {
            eprint!("\rProcessing Slide {}/{}", current, total);
            let _ = std::io::stderr().flush();
        }
        Progress::Done { totals, files, failures } => {
            eprintln!(
                "{} files ({} failed), {} slides, {} images, {} OCR blocks",
                files, failures, totals.slides, totals.images, totals.ocr_blocks
            );
            eprintln!("--- COMPLETED ---");
        }
        Progress::FileFinished { path, stats } => {
            // End the in-place slide counter line
            if stats.slides > 0 {
                eprintln!();
            }
            log::info!(
                "{}: {} slides, {} text frames, {} images ({} saved), {} OCR blocks, \
                 {} image errors",
                display_name(path),
                stats.slides,
                stats.text_frames,
                stats.images,
                stats.images_saved,
                stats.ocr_blocks,
                stats.image_errors
            );
        }
    }
}

/// Write the run report as pretty JSON.
fn write_report(path: &Path, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(())
}
