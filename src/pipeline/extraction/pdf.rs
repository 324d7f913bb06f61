use std::sync::Arc;

use super::ocr::ImageOcrExtractor;
use super::progress::{ExtractionContext, ProgressRange, ProgressStatus};
use super::types::{FileDocument, MediaKind, PdfBackend, PdfDocumentHandle};
use super::ExtractionError;
use crate::config::PdfSettings;

/// Progress slice used by direct text-layer extraction.
pub const DIRECT_TEXT_RANGE: ProgressRange = ProgressRange { start: 0, end: 80 };

/// Progress slice used by the OCR fallback.
pub const OCR_FALLBACK_RANGE: ProgressRange = ProgressRange { start: 80, end: 100 };

/// PDF → text: text layer first, OCR of rendered pages when the layer is too thin.
///
/// Only the first `max_pages` pages are ever touched. Scanned recipe PDFs
/// often have no text layer at all, which is what the OCR fallback is for.
pub struct PdfTextExtractor {
    backend: Arc<dyn PdfBackend>,
    ocr: Arc<ImageOcrExtractor>,
    settings: PdfSettings,
}

impl PdfTextExtractor {
    pub fn new(
        backend: Arc<dyn PdfBackend>,
        ocr: Arc<ImageOcrExtractor>,
        settings: PdfSettings,
    ) -> Self {
        Self {
            backend,
            ocr,
            settings,
        }
    }

    pub async fn extract_from_pdf(
        &self,
        document: &FileDocument,
        ctx: &ExtractionContext,
    ) -> Result<String, ExtractionError> {
        // validating
        ctx.report(0, ProgressStatus::Preparing);
        self.validate(document)?;
        ctx.check_cancelled()?;

        // loading
        ctx.report(0, ProgressStatus::Loading);
        ctx.status("Opening PDF");
        let load_timeout = self.settings.load_timeout();
        let handle = ctx
            .run_cancellable(async {
                tokio::time::timeout(load_timeout, self.backend.load(document.bytes.clone()))
                    .await
                    .map_err(|_| ExtractionError::timeout("PDF loading", load_timeout))?
            })
            .await?;
        let mut guard = DocumentGuard::new(handle);

        // extracting-pages → ocr-fallback, under one deadline
        let work_ctx = ctx.child();
        let overall = self.settings.overall_timeout();
        let outcome =
            match tokio::time::timeout(overall, self.extract_pages(&guard, &work_ctx)).await {
                Ok(result) => result,
                Err(_) => {
                    work_ctx.cancel.cancel();
                    Err(ExtractionError::timeout("PDF extraction", overall))
                }
            };

        guard.release();
        outcome
    }

    fn validate(&self, document: &FileDocument) -> Result<(), ExtractionError> {
        if document.kind() != MediaKind::Pdf {
            return Err(ExtractionError::UnsupportedMediaType(format!(
                "expected a PDF, got {}",
                document.media_type
            )));
        }
        if document.size() > self.settings.max_bytes {
            return Err(ExtractionError::FileTooLarge {
                size: document.size(),
                max: self.settings.max_bytes,
            });
        }
        Ok(())
    }

    async fn extract_pages(
        &self,
        guard: &DocumentGuard,
        ctx: &ExtractionContext,
    ) -> Result<String, ExtractionError> {
        let handle = guard.get()?;
        let total = handle.page_count();
        if total == 0 {
            return Err(ExtractionError::PdfParsing("document has no pages".into()));
        }

        let pages = total.min(self.settings.max_pages.max(1));
        if pages < total {
            tracing::info!(total_pages = total, processed = pages, "Page cap applied");
        }

        ctx.report(DIRECT_TEXT_RANGE.start, ProgressStatus::Extracting);
        let mut page_texts = Vec::with_capacity(pages);
        for index in 0..pages {
            ctx.check_cancelled()?;
            ctx.status(format!("Reading page {} of {pages}", index + 1));

            let text = match ctx.run_cancellable(handle.page_text(index)).await {
                Ok(text) => text,
                Err(ExtractionError::Cancelled) => return Err(ExtractionError::Cancelled),
                Err(e) => {
                    tracing::warn!(page = index + 1, error = %e, "Text layer unreadable, treating page as empty");
                    String::new()
                }
            };
            tracing::debug!(page = index + 1, chars = text.len(), "Text layer read");
            page_texts.push(text);

            let fraction = (index + 1) as f32 / pages as f32;
            ctx.report(DIRECT_TEXT_RANGE.at(fraction), ProgressStatus::Extracting);
        }

        let direct = join_pages(page_texts);
        let yield_chars = meaningful_chars(&direct);
        if yield_chars >= self.settings.min_text_chars {
            tracing::info!(pages, chars = direct.len(), "PDF text layer extracted");
            return Ok(direct);
        }

        tracing::info!(
            chars = yield_chars,
            threshold = self.settings.min_text_chars,
            "Text layer too thin, falling back to OCR"
        );
        ctx.check_cancelled()?;
        ctx.report(OCR_FALLBACK_RANGE.start, ProgressStatus::OcrFallback);
        ctx.status("No usable text found, reading the scanned pages");

        match self.ocr_pages(handle, pages, ctx).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) if !direct.is_empty() => Ok(direct),
            Ok(_) => Err(ExtractionError::NoText),
            Err(ExtractionError::Cancelled) => Err(ExtractionError::Cancelled),
            Err(e) if !direct.is_empty() => {
                tracing::warn!(error = %e, "OCR fallback failed, keeping sparse text layer");
                Ok(direct)
            }
            Err(e) => Err(e),
        }
    }

    /// Render each capped page and OCR it, each page owning an equal share of
    /// the fallback progress range. Pages that fail to render are skipped.
    async fn ocr_pages(
        &self,
        handle: &dyn PdfDocumentHandle,
        pages: usize,
        ctx: &ExtractionContext,
    ) -> Result<String, ExtractionError> {
        let mut texts = Vec::with_capacity(pages);
        let mut last_error = None;

        for index in 0..pages {
            ctx.check_cancelled()?;
            let slice = OCR_FALLBACK_RANGE.slice(index, pages);

            let image = match ctx
                .run_cancellable(handle.render_page(index, self.settings.render_dpi))
                .await
            {
                Ok(image) => image,
                Err(ExtractionError::Cancelled) => return Err(ExtractionError::Cancelled),
                Err(e) => {
                    tracing::warn!(page = index + 1, error = %e, "Page render failed, skipping");
                    last_error = Some(e);
                    continue;
                }
            };

            ctx.status(format!("Recognizing page {} of {pages}", index + 1));
            texts.push(self.ocr.recognize(&image, ctx, slice).await?);
        }

        if texts.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Ok(join_pages(texts))
    }
}

/// Pages joined with a blank line; empty pages dropped.
fn join_pages(pages: Vec<String>) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn meaningful_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Sole owner of an open PDF. Releases it exactly once, on `release()` or drop.
pub(crate) struct DocumentGuard {
    handle: Option<Box<dyn PdfDocumentHandle>>,
}

impl DocumentGuard {
    pub(crate) fn new(handle: Box<dyn PdfDocumentHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn get(&self) -> Result<&dyn PdfDocumentHandle, ExtractionError> {
        self.handle
            .as_deref()
            .ok_or_else(|| ExtractionError::PdfParsing("document already released".into()))
    }

    /// Idempotent.
    pub(crate) fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            tracing::debug!("PDF document released");
        }
    }
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        self.release();
    }
}
