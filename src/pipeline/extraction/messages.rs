use serde::Serialize;

use crate::pipeline::error::{ConversionError, ConversionErrorKind};

/// Fixed user-facing messages. Library error text is never shown directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMessage {
    Timeout,
    PasswordProtected,
    Network,
    FileTooLarge,
    OutOfMemory,
    Cancelled,
    ManualEntry,
    Generic,
}

impl UserMessage {
    pub fn text(&self) -> &'static str {
        match self {
            UserMessage::Timeout => {
                "This is taking too long. Try a smaller file or paste the recipe text instead."
            }
            UserMessage::PasswordProtected => {
                "This PDF is password protected. Remove the password and try again."
            }
            UserMessage::Network => {
                "The conversion service could not be reached. Check your connection and try again."
            }
            UserMessage::FileTooLarge => "This file is too large. Please use a smaller file.",
            UserMessage::OutOfMemory => {
                "This file is too complex to process. Try a single page or a smaller image."
            }
            UserMessage::Cancelled => "Conversion cancelled.",
            UserMessage::ManualEntry => {
                "We could not read the recipe structure. Try entering the recipe text manually."
            }
            UserMessage::Generic => "Something went wrong while reading this file. Please try again.",
        }
    }
}

/// Classify an error into a user-facing template: by kind first, then by
/// substring of the underlying message.
pub fn user_message(error: &ConversionError) -> UserMessage {
    match error.kind {
        ConversionErrorKind::Cancelled => return UserMessage::Cancelled,
        ConversionErrorKind::Timeout => return UserMessage::Timeout,
        ConversionErrorKind::ParsingError => return UserMessage::ManualEntry,
        _ => {}
    }

    let haystack = format!(
        "{} {}",
        error.message,
        error.details.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

    if has(&["timed out", "timeout"]) {
        UserMessage::Timeout
    } else if has(&["password", "encrypted"]) {
        UserMessage::PasswordProtected
    } else if has(&["too large", "exceeds"]) {
        UserMessage::FileTooLarge
    } else if has(&["out of memory", "memory", "allocation"]) {
        UserMessage::OutOfMemory
    } else if has(&["network", "connect", "not reachable", "worker", "fetch"]) {
        UserMessage::Network
    } else if has(&["cancelled", "canceled", "aborted"]) {
        UserMessage::Cancelled
    } else {
        UserMessage::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ExtractionError;
    use crate::pipeline::structuring::StructuringError;

    fn api(message: &str) -> ConversionError {
        ConversionError::new(ConversionErrorKind::ApiError, message)
    }

    #[test]
    fn kinds_take_priority() {
        assert_eq!(user_message(&ConversionError::cancelled()), UserMessage::Cancelled);
        let timeout = ConversionError::from(ExtractionError::Timeout {
            phase: "PDF loading",
            secs: 15.0,
        });
        assert_eq!(user_message(&timeout), UserMessage::Timeout);
        let parse = ConversionError::from(StructuringError::JsonParsing("bad".into()));
        assert_eq!(user_message(&parse), UserMessage::ManualEntry);
    }

    #[test]
    fn substrings_classify_library_errors() {
        assert_eq!(
            user_message(&api("PDF parsing failed: file is encrypted")),
            UserMessage::PasswordProtected
        );
        assert_eq!(
            user_message(&api("OCR processing failed: Vision OCR is not reachable at http://localhost:11434")),
            UserMessage::Network
        );
        assert_eq!(
            user_message(&api("Image processing error: memory allocation of 4GB failed")),
            UserMessage::OutOfMemory
        );
        assert_eq!(
            user_message(&api("OCR processing failed: request timed out after 120s")),
            UserMessage::Timeout
        );
        assert_eq!(user_message(&api("unexpected glyph table")), UserMessage::Generic);
    }

    #[test]
    fn size_validation_maps_to_too_large() {
        let err = ConversionError::from(ExtractionError::FileTooLarge {
            size: 9 * 1024 * 1024,
            max: 8 * 1024 * 1024,
        });
        assert_eq!(user_message(&err), UserMessage::FileTooLarge);
        assert!(UserMessage::FileTooLarge.text().contains("too large"));
    }

    #[test]
    fn every_template_has_text() {
        for message in [
            UserMessage::Timeout,
            UserMessage::PasswordProtected,
            UserMessage::Network,
            UserMessage::FileTooLarge,
            UserMessage::OutOfMemory,
            UserMessage::Cancelled,
            UserMessage::ManualEntry,
            UserMessage::Generic,
        ] {
            assert!(!message.text().is_empty());
        }
    }
}
