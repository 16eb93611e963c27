//! Output formats and section headers.
//!
//! Plain text headers are banner lines, markdown headers are ATX headings.
//! Every header starts with a newline so it separates itself from whatever
//! was written before it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of `=` characters on each side of a plain text header.
const TXT_BANNER_WIDTH: usize = 5;

/// The kind of notes file being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Plain text (`.txt`).
    #[default]
    Txt,
    /// Markdown (`.md`).
    Md,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Md => "md",
        }
    }

    /// Render a header line for this format.
    ///
    /// # Example output
    /// ```text
    ///
    /// ===== Slide 3 =====
    /// ```
    /// or, for markdown at level 2, `\n## Slide 3 \n`.
    pub fn header(&self, text: &str, level: usize) -> String {
        match self {
            OutputFormat::Md => format!("\n{} {} \n", "#".repeat(level.max(1)), text),
            OutputFormat::Txt => {
                let banner = "=".repeat(TXT_BANNER_WIDTH);
                format!("\n{} {} {}\n", banner, text, banner)
            }
        }
    }

    /// Header naming the source file (level 1).
    pub fn source_header(&self, filename: &str) -> String {
        self.header(&format!("Source: {}", filename), 1)
    }

    /// Header for a 1-based slide number (level 2).
    pub fn slide_header(&self, number: usize) -> String {
        self.header(&format!("Slide {}", number), 2)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Txt),
            "md" | "markdown" => Ok(OutputFormat::Md),
            other => Err(crate::Error::UnsupportedFormat(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txt_header() {
        assert_eq!(
            OutputFormat::Txt.header("Slide 1", 2),
            "\n===== Slide 1 =====\n"
        );
        // Level does not change plain text banners
        assert_eq!(
            OutputFormat::Txt.header("Slide 1", 1),
            OutputFormat::Txt.header("Slide 1", 2)
        );
    }

    #[test]
    fn test_md_header_keeps_trailing_space() {
        assert_eq!(OutputFormat::Md.header("Slide 1", 2), "\n## Slide 1 \n");
        assert_eq!(OutputFormat::Md.header("Top", 1), "\n# Top \n");
    }

    #[test]
    fn test_source_and_slide_headers() {
        assert_eq!(
            OutputFormat::Md.source_header("deck.pptx"),
            "\n# Source: deck.pptx \n"
        );
        assert_eq!(
            OutputFormat::Txt.slide_header(12),
            "\n===== Slide 12 =====\n"
        );
    }

    #[test]
    fn test_parse_and_extension() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Md);
        assert_eq!("Markdown".parse::<OutputFormat>().unwrap(), OutputFormat::Md);
        assert_eq!(" TXT ".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert!("docx".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Md.extension(), "md");
        assert_eq!(OutputFormat::default().to_string(), "txt");
    }
}
