//! Batch processing of several presentations.
//!
//! Inputs are either written to one notes file each, or appended in order to
//! a single combined file. A failure on one input is reported and the batch
//! moves on to the next.

use anyhow::{Context, Result};
use clap::ValueEnum;
use ripper_core::{rip_slides, PresentationSource, RipStats, SlideRipper};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

/// Base name of the combined notes file.
pub const COMBINED_NOTES_STEM: &str = "Combined_Notes";

/// How inputs map to output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// All inputs go into one notes file.
    Combine,
    /// One notes file per input.
    Separate,
}

/// Events sent from the worker thread while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Started reading an input (1-based index).
    FileStarted { index: usize, total: usize, path: PathBuf },
    /// Finished a slide of the current input.
    Slide { current: usize, total: usize },
    /// Finished an input.
    FileFinished { path: PathBuf, stats: RipStats },
    /// An input failed; the batch continues.
    FileFailed { path: PathBuf, error: String },
    /// An output file was opened for writing.
    OutputOpened { path: PathBuf },
    /// Every input has been handled. Always the last event of a run.
    Done {
        totals: RipStats,
        files: usize,
        failures: usize,
    },
}

/// Per-input result in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RipStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub format: String,
    pub mode: MergeMode,
    pub files: Vec<FileReport>,
    pub totals: RipStats,
}

impl BatchReport {
    /// Number of inputs that failed.
    pub fn failures(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }
}

/// A queued batch of presentations.
#[derive(Debug, Clone)]
pub struct BatchJob {
    inputs: Vec<PathBuf>,
    mode: MergeMode,
    output_dir: Option<PathBuf>,
}

impl BatchJob {
    /// Queue inputs, dropping duplicates while keeping the first occurrence.
    pub fn new(inputs: impl IntoIterator<Item = PathBuf>, mode: MergeMode) -> Self {
        let mut queued: Vec<PathBuf> = Vec::new();
        for input in inputs {
            if queued.contains(&input) {
                log::debug!("{} already queued", input.display());
                continue;
            }
            log::info!("Queued {}", display_name(&input));
            queued.push(input);
        }

        Self {
            inputs: queued,
            mode,
            output_dir: None,
        }
    }

    /// Write outputs into `dir` instead of next to the inputs.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Output path for one input in separate mode.
    pub fn separate_output_path(&self, input: &Path, ext: &str) -> PathBuf {
        match &self.output_dir {
            Some(dir) => {
                let stem = input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("output");
                dir.join(format!("{}.{}", stem, ext))
            }
            None => input.with_extension(ext),
        }
    }

    /// Output path for the combined notes file.
    ///
    /// Lives in the output directory if one is set, else beside the first input.
    pub fn combined_output_path(&self, ext: &str) -> PathBuf {
        let filename = format!("{}.{}", COMBINED_NOTES_STEM, ext);
        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .inputs
                .first()
                .and_then(|p| p.parent())
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        dir.join(filename)
    }

    /// Run the batch, reporting progress on `events`.
    ///
    /// Returns an error only when an output file cannot be created; per-input
    /// failures are recorded in the report.
    pub fn run(
        &self,
        source: &dyn PresentationSource,
        ripper: &SlideRipper<'_>,
        events: &Sender<Progress>,
    ) -> Result<BatchReport> {
        let ext = ripper.format().extension();

        if let Some(dir) = &self.output_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        }

        let files = match self.mode {
            MergeMode::Separate => self.run_separate(source, ripper, events, ext)?,
            MergeMode::Combine => self.run_combined(source, ripper, events, ext)?,
        };

        let mut totals = RipStats::default();
        for stats in files.iter().filter_map(|f| f.stats.as_ref()) {
            totals.merge(stats);
        }

        let report = BatchReport {
            format: ext.to_string(),
            mode: self.mode,
            files,
            totals,
        };
        send(events, Progress::Done {
            totals: report.totals.clone(),
            files: report.files.len(),
            failures: report.failures(),
        });

        Ok(report)
    }

    fn run_separate(
        &self,
        source: &dyn PresentationSource,
        ripper: &SlideRipper<'_>,
        events: &Sender<Progress>,
        ext: &str,
    ) -> Result<Vec<FileReport>> {
        let total = self.inputs.len();
        let mut files = Vec::with_capacity(total);

        for (idx, input) in self.inputs.iter().enumerate() {
            send(events, Progress::FileStarted {
                index: idx + 1,
                total,
                path: input.clone(),
            });

            let output = self.separate_output_path(input, ext);
            let result = check_input(input).and_then(|()| {
                let file = File::create(&output)
                    .with_context(|| format!("Failed to create {}", output.display()))?;
                send(events, Progress::OutputOpened { path: output.clone() });
                let mut writer = BufWriter::new(file);
                rip_one(source, ripper, input, &mut writer, events)
            });

            files.push(record(input, &output, result, events));
        }

        Ok(files)
    }

    fn run_combined(
        &self,
        source: &dyn PresentationSource,
        ripper: &SlideRipper<'_>,
        events: &Sender<Progress>,
        ext: &str,
    ) -> Result<Vec<FileReport>> {
        let output = self.combined_output_path(ext);
        let file = File::create(&output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        send(events, Progress::OutputOpened { path: output.clone() });
        let mut writer = BufWriter::new(file);

        let total = self.inputs.len();
        let mut files = Vec::with_capacity(total);

        for (idx, input) in self.inputs.iter().enumerate() {
            send(events, Progress::FileStarted {
                index: idx + 1,
                total,
                path: input.clone(),
            });

            let result = check_input(input)
                .and_then(|()| rip_one(source, ripper, input, &mut writer, events));
            files.push(record(input, &output, result, events));
        }

        writer
            .flush()
            .with_context(|| format!("Failed to write to {}", output.display()))?;

        Ok(files)
    }
}

/// Missing inputs are failures here, so no empty output is created for them.
fn check_input(input: &Path) -> Result<()> {
    if input.is_file() {
        Ok(())
    } else {
        anyhow::bail!("{} does not exist or is not a file", input.display())
    }
}

fn rip_one<W: Write>(
    source: &dyn PresentationSource,
    ripper: &SlideRipper<'_>,
    input: &Path,
    writer: &mut W,
    events: &Sender<Progress>,
) -> Result<RipStats> {
    let mut progress = |current: usize, total: usize| {
        send(events, Progress::Slide { current, total });
    };
    let stats = rip_slides(source, input, writer, ripper, &mut progress)
        .with_context(|| format!("Failed to process {}", display_name(input)))?;
    Ok(stats)
}

fn record(
    input: &Path,
    output: &Path,
    result: Result<RipStats>,
    events: &Sender<Progress>,
) -> FileReport {
    match result {
        Ok(stats) => {
            send(events, Progress::FileFinished {
                path: input.to_path_buf(),
                stats: stats.clone(),
            });
            FileReport {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                stats: Some(stats),
                error: None,
            }
        }
        Err(e) => {
            let error = format!("{:#}", e);
            send(events, Progress::FileFailed {
                path: input.to_path_buf(),
                error: error.clone(),
            });
            FileReport {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                stats: None,
                error: Some(error),
            }
        }
    }
}

/// Progress is best effort; a closed receiver does not stop the batch.
fn send(events: &Sender<Progress>, event: Progress) {
    if events.send(event).is_err() {
        log::trace!("progress receiver closed");
    }
}

/// File name of a path for messages.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripper_core::{
        Error, ExtractedSlide, OutputFormat, Presentation, PresentationFormat, SlideShape,
    };
    use std::fs;
    use std::sync::mpsc;

    /// Serves a one-slide deck whose text is the file's contents.
    struct EchoSource;

    impl PresentationSource for EchoSource {
        fn open(&self, path: &Path) -> ripper_core::Result<Presentation> {
            let text = fs::read_to_string(path)?;
            if text.starts_with("corrupt") {
                return Err(Error::ZipError("invalid Zip archive".into()));
            }
            let mut presentation = Presentation::new("deck", PresentationFormat::Pptx);
            let mut slide = ExtractedSlide::new(1);
            slide.add_shape(SlideShape::text("Body", text));
            presentation.add_slide(slide);
            Ok(presentation)
        }
    }

    fn write_input(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_dedup_keeps_order() {
        let job = BatchJob::new(
            vec![
                PathBuf::from("b.pptx"),
                PathBuf::from("a.pptx"),
                PathBuf::from("b.pptx"),
            ],
            MergeMode::Combine,
        );
        assert_eq!(
            job.inputs(),
            &[PathBuf::from("b.pptx"), PathBuf::from("a.pptx")]
        );
    }

    #[test]
    fn test_output_paths() {
        let job = BatchJob::new(
            vec![PathBuf::from("/decks/week1/intro.pptx"), PathBuf::from("/other/x.pptx")],
            MergeMode::Separate,
        );
        assert_eq!(
            job.separate_output_path(Path::new("/decks/week1/intro.pptx"), "md"),
            PathBuf::from("/decks/week1/intro.md")
        );
        assert_eq!(
            job.combined_output_path("txt"),
            PathBuf::from("/decks/week1/Combined_Notes.txt")
        );

        let job = job.with_output_dir(Some(PathBuf::from("/out")));
        assert_eq!(
            job.separate_output_path(Path::new("/decks/week1/intro.pptx"), "md"),
            PathBuf::from("/out/intro.md")
        );
        assert_eq!(
            job.combined_output_path("md"),
            PathBuf::from("/out/Combined_Notes.md")
        );
    }

    #[test]
    fn test_separate_mode_writes_one_file_each() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_input(dir.path(), "alpha.pptx", "Alpha text");
        let b = write_input(dir.path(), "beta.pptx", "Beta text");

        let (tx, rx) = mpsc::channel();
        let ripper = SlideRipper::new(OutputFormat::Md);
        let report = BatchJob::new(vec![a, b], MergeMode::Separate)
            .run(&EchoSource, &ripper, &tx)
            .unwrap();
        drop(tx);

        assert_eq!(report.failures(), 0);
        assert_eq!(report.totals.slides, 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("alpha.md")).unwrap(),
            "\n# Source: alpha.pptx \n\n## Slide 1 \nAlpha text\n"
        );
        assert!(fs::read_to_string(dir.path().join("beta.md"))
            .unwrap()
            .contains("Beta text"));

        let events: Vec<Progress> = rx.iter().collect();
        assert!(events.contains(&Progress::Slide { current: 1, total: 1 }));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Progress::FileFinished { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_combined_mode_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_input(dir.path(), "one.pptx", "First deck");
        let b = write_input(dir.path(), "two.pptx", "Second deck");

        let (tx, _rx) = mpsc::channel();
        let ripper = SlideRipper::new(OutputFormat::Txt);
        let report = BatchJob::new(vec![a, b], MergeMode::Combine)
            .run(&EchoSource, &ripper, &tx)
            .unwrap();

        let combined = fs::read_to_string(dir.path().join("Combined_Notes.txt")).unwrap();
        assert_eq!(
            combined,
            "\n===== Source: one.pptx =====\n\n===== Slide 1 =====\nFirst deck\n\
             \n===== Source: two.pptx =====\n\n===== Slide 1 =====\nSecond deck\n"
        );
        assert!(report
            .files
            .iter()
            .all(|f| f.output == dir.path().join("Combined_Notes.txt")));
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_input(dir.path(), "bad.pptx", "corrupt bytes");
        let missing = dir.path().join("missing.pptx");
        let good = write_input(dir.path(), "good.pptx", "Survivor");

        let (tx, rx) = mpsc::channel();
        let ripper = SlideRipper::new(OutputFormat::Txt);
        let report = BatchJob::new(vec![bad, missing, good], MergeMode::Separate)
            .run(&EchoSource, &ripper, &tx)
            .unwrap();
        drop(tx);

        assert_eq!(report.failures(), 2);
        assert!(report.files[0]
            .error
            .as_deref()
            .unwrap()
            .contains("invalid Zip archive"));
        assert!(!dir.path().join("missing.txt").exists());
        assert!(fs::read_to_string(dir.path().join("good.txt"))
            .unwrap()
            .contains("Survivor"));

        let failed = rx
            .iter()
            .filter(|e| matches!(e, Progress::FileFailed { .. }))
            .count();
        assert_eq!(failed, 2);
    }

    #[test]
    fn test_done_is_the_last_event() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_input(dir.path(), "good.pptx", "Fine");
        let bad = write_input(dir.path(), "bad.pptx", "corrupt");

        let (tx, rx) = mpsc::channel();
        let ripper = SlideRipper::new(OutputFormat::Txt);
        BatchJob::new(vec![good.clone(), bad], MergeMode::Combine)
            .run(&EchoSource, &ripper, &tx)
            .unwrap();
        drop(tx);

        let events: Vec<Progress> = rx.iter().collect();
        assert!(matches!(events.first(), Some(Progress::OutputOpened { .. })));
        assert_eq!(
            events[1],
            Progress::FileStarted {
                index: 1,
                total: 2,
                path: good
            }
        );
        match events.last() {
            Some(Progress::Done {
                totals,
                files,
                failures,
            }) => {
                assert_eq!(*files, 2);
                assert_eq!(*failures, 1);
                assert_eq!(totals.slides, 1);
            }
            other => panic!("expected Done last, got {:?}", other),
        }
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Progress::Done { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "deck.pptx", "Hello");
        let out = dir.path().join("notes").join("md");

        let (tx, _rx) = mpsc::channel();
        let ripper = SlideRipper::new(OutputFormat::Md);
        BatchJob::new(vec![input], MergeMode::Separate)
            .with_output_dir(Some(out.clone()))
            .run(&EchoSource, &ripper, &tx)
            .unwrap();

        assert!(out.join("deck.md").exists());
    }

    #[test]
    fn test_report_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "deck.pptx", "Hello");

        let (tx, _rx) = mpsc::channel();
        let ripper = SlideRipper::new(OutputFormat::Txt);
        let report = BatchJob::new(vec![input], MergeMode::Combine)
            .run(&EchoSource, &ripper, &tx)
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "combine");
        assert_eq!(json["format"], "txt");
        assert_eq!(json["totals"]["text_frames"], 1);
        assert!(json["files"][0].get("error").is_none());
    }
}
