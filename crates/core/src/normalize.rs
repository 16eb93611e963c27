//! Text cleanup for text frames before they are written out.
//!
//! Text frames are written as they appear in the deck. The normalizer only
//! folds Unicode to NFC and unifies line breaks, unless whitespace collapsing
//! is requested.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse multiple spaces or tabs into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());

/// Vertical tab, which PowerPoint uses for soft line breaks in copied text.
const VERTICAL_TAB: char = '\u{000B}';

/// Text normalizer for slide text frames.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    /// Collapse runs of spaces and tabs and trim each line.
    collapse_whitespace: bool,
}

impl TextNormalizer {
    /// Create a normalizer that keeps spacing intact.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether runs of whitespace are collapsed and lines trimmed.
    pub fn with_collapse_whitespace(mut self, collapse: bool) -> Self {
        self.collapse_whitespace = collapse;
        self
    }

    /// Normalize the text of one text frame.
    ///
    /// - Applies Unicode NFC composition
    /// - Converts `\r\n`, `\r`, and vertical tabs to `\n`
    /// - Optionally collapses spaces/tabs and trims each line
    pub fn normalize(&self, text: &str) -> String {
        let composed: String = text.nfc().collect();
        let unified = composed
            .replace("\r\n", "\n")
            .replace(['\r', VERTICAL_TAB], "\n");

        if !self.collapse_whitespace {
            return unified;
        }

        unified
            .split('\n')
            .map(|line| {
                let collapsed = WHITESPACE_COLLAPSE_REGEX.replace_all(line, " ");
                collapsed.trim().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
