pub mod types;
pub mod progress;
pub mod normalize;
pub mod ocr;
pub mod vision_ocr;
pub mod pdf;
pub mod pdf_renderer;
pub mod orchestrator;
pub mod messages;

pub use types::*;
pub use progress::*;
pub use normalize::*;
pub use ocr::*;
pub use pdf::*;
pub use orchestrator::*;
pub use messages::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("{phase} timed out after {secs:.1}s")]
    Timeout { phase: &'static str, secs: f64 },

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("No text could be extracted from the document")]
    NoText,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    pub(crate) fn timeout(phase: &'static str, after: std::time::Duration) -> Self {
        ExtractionError::Timeout {
            phase,
            secs: after.as_secs_f64(),
        }
    }
}
