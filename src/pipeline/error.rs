use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::extraction::ExtractionError;
use super::structuring::StructuringError;

/// Category of a caller-facing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionErrorKind {
    /// Structuring output did not parse, even after the recovery retry.
    ParsingError,
    /// OCR, PDF library or completion API failure.
    ApiError,
    /// Bad input shape or size, detected before any work starts.
    ValidationError,
    EmptyInput,
    Timeout,
    /// User-initiated. Never shown as a failure.
    Cancelled,
}

/// Error value returned by every caller-facing operation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct ConversionError {
    pub kind: ConversionErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ConversionError {
    pub fn new(kind: ConversionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ConversionErrorKind::ValidationError, message)
    }

    pub fn empty_input() -> Self {
        Self::new(ConversionErrorKind::EmptyInput, "No text to convert")
    }

    pub fn cancelled() -> Self {
        Self::new(ConversionErrorKind::Cancelled, "Conversion cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ConversionErrorKind::Cancelled
    }
}

impl From<ExtractionError> for ConversionError {
    fn from(e: ExtractionError) -> Self {
        let kind = match &e {
            ExtractionError::UnsupportedMediaType(_)
            | ExtractionError::InvalidInput(_)
            | ExtractionError::FileTooLarge { .. }
            | ExtractionError::EncodingError(_) => ConversionErrorKind::ValidationError,
            ExtractionError::Timeout { .. } => ConversionErrorKind::Timeout,
            ExtractionError::Cancelled => ConversionErrorKind::Cancelled,
            ExtractionError::NoText => ConversionErrorKind::EmptyInput,
            ExtractionError::OcrProcessing(_)
            | ExtractionError::PdfParsing(_)
            | ExtractionError::ImageProcessing(_)
            | ExtractionError::Io(_) => ConversionErrorKind::ApiError,
        };
        ConversionError::new(kind, e.to_string())
    }
}

impl From<StructuringError> for ConversionError {
    fn from(e: StructuringError) -> Self {
        match &e {
            StructuringError::InputEmpty => ConversionError::empty_input(),
            StructuringError::Timeout(_) => {
                ConversionError::new(ConversionErrorKind::Timeout, e.to_string())
            }
            err if err.is_parse_error() => ConversionError::new(
                ConversionErrorKind::ParsingError,
                "The AI response could not be read as a recipe",
            )
            .with_details(e.to_string()),
            _ => ConversionError::new(ConversionErrorKind::ApiError, e.to_string()),
        }
    }
}
