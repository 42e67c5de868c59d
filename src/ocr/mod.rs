//! Text extraction from uploaded images
//!
//! OCR is delegated to an external binary (Tesseract by default); this module
//! only spawns it, bounds its runtime and trims its output.

mod tesseract;

pub use tesseract::TesseractOcr;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Failures while running the OCR engine
#[derive(Debug, Error)]
pub enum OcrError {
    /// The binary could not be started
    #[error("OCR engine unavailable: {message}")]
    Unavailable { message: String },

    /// The binary ran and failed
    #[error("OCR failed (exit code {exit_code:?}): {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The binary did not finish in time
    #[error("OCR timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Reading the binary's output failed
    #[error("OCR output unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can read text out of an image file
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Extract text from the image at `path`
    async fn extract_text(&self, path: &Path) -> Result<String, OcrError>;

    /// Check whether the engine can be run at all
    async fn is_available(&self) -> bool;
}
