//! OCR engine configuration

use serde::{Deserialize, Serialize};

/// Configuration for the external OCR binary
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct OcrConfig {
    /// OCR executable (invoked as `<command> <image> stdout [args]`)
    pub command: String,

    /// Extra arguments appended after the output target
    pub args: Vec<String>,

    /// Whether uploads are sent to OCR at all
    pub enabled: bool,

    /// Timeout in seconds for a single extraction
    pub timeout: u64,

    /// Extracted text is truncated to this many characters
    pub max_chars: usize,

    /// When non-empty, only filenames containing one of these run OCR
    pub report_keywords: Vec<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".into(),
            args: Vec::new(),
            enabled: true,
            timeout: 60,
            max_chars: 2000,
            report_keywords: Vec::new(),
        }
    }
}

impl OcrConfig {
    /// Returns true if a file with this name should be sent to OCR
    pub fn wants(&self, filename: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self.report_keywords.is_empty() {
            return true;
        }
        let lower = filename.to_lowercase();
        self.report_keywords
            .iter()
            .any(|k| lower.contains(&k.to_lowercase()))
    }
}
