use std::sync::Arc;

use super::progress::{ExtractionContext, ProgressRange, ProgressStatus};
use super::types::{FileDocument, MediaKind, OcrEngine};
use super::ExtractionError;

/// Image → text via an injected OCR engine.
///
/// Owns validation, progress mapping and cancellation; the engine only
/// recognizes pixels.
pub struct ImageOcrExtractor {
    engine: Arc<dyn OcrEngine>,
    max_image_bytes: u64,
}

impl ImageOcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, max_image_bytes: u64) -> Self {
        Self {
            engine,
            max_image_bytes,
        }
    }

    /// Validate an uploaded image and OCR it across the full 0–100 range
    /// reserved by the caller.
    pub async fn extract_from_image(
        &self,
        document: &FileDocument,
        ctx: &ExtractionContext,
        range: ProgressRange,
    ) -> Result<String, ExtractionError> {
        if document.kind() != MediaKind::Image {
            return Err(ExtractionError::UnsupportedMediaType(format!(
                "expected an image, got {}",
                document.media_type
            )));
        }
        if document.size() > self.max_image_bytes {
            return Err(ExtractionError::FileTooLarge {
                size: document.size(),
                max: self.max_image_bytes,
            });
        }
        validate_image_bytes(&document.bytes)?;

        self.recognize(&document.bytes, ctx, range).await
    }

    /// OCR already-validated image bytes (also used for rendered PDF pages).
    ///
    /// Progress stays strictly below `range.end` until the engine succeeds.
    pub(crate) async fn recognize(
        &self,
        image_bytes: &[u8],
        ctx: &ExtractionContext,
        range: ProgressRange,
    ) -> Result<String, ExtractionError> {
        ctx.check_cancelled()?;
        ctx.report(range.start, ProgressStatus::Recognizing);

        let on_progress = |fraction: f32| {
            ctx.report(range.before_end(fraction), ProgressStatus::Recognizing);
        };

        let page = ctx
            .run_cancellable(self.engine.recognize(image_bytes, &on_progress, &ctx.cancel))
            .await
            .map_err(|e| match e {
                ExtractionError::Cancelled
                | ExtractionError::Timeout { .. }
                | ExtractionError::OcrProcessing(_) => e,
                other => ExtractionError::OcrProcessing(other.to_string()),
            })?;

        tracing::debug!(
            engine = self.engine.engine_name(),
            chars = page.text.len(),
            confidence = page.confidence,
            "OCR pass complete"
        );

        ctx.report(range.end, ProgressStatus::Recognizing);
        Ok(page.text)
    }
}

/// Reject byte buffers that do not start with a known image signature.
fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::InvalidInput("image file is empty".into()));
    }
    image::guess_format(bytes)
        .map(|_| ())
        .map_err(|e| ExtractionError::InvalidInput(format!("not a readable image: {e}")))
}
