use std::sync::Arc;

use tracing::Instrument;

use super::normalize::normalize;
use super::ocr::ImageOcrExtractor;
use super::pdf::PdfTextExtractor;
use super::pdf_renderer::LopdfBackend;
use super::progress::{ExtractionContext, ProgressRange, ProgressStatus};
use super::types::{MediaKind, NormalizedText, OcrEngine, PdfBackend, RawDocument};
use super::vision_ocr::OllamaVisionOcr;
use super::ExtractionError;
use crate::config::ConverterConfig;
use crate::pipeline::error::ConversionError;

/// Dispatches a raw document to the right extractor and normalizes the result.
///
/// Owns the terminal progress event: `done` at 100 on success, `cancelled`
/// or `error` at the last reached percentage otherwise.
pub struct ExtractionOrchestrator {
    image: Arc<ImageOcrExtractor>,
    pdf: PdfTextExtractor,
}

impl ExtractionOrchestrator {
    pub fn new(
        ocr_engine: Arc<dyn OcrEngine>,
        pdf_backend: Arc<dyn PdfBackend>,
        config: &ConverterConfig,
    ) -> Self {
        let image = Arc::new(ImageOcrExtractor::new(
            ocr_engine,
            config.ocr.max_image_bytes,
        ));
        let pdf = PdfTextExtractor::new(pdf_backend, image.clone(), config.pdf.clone());
        Self { image, pdf }
    }

    /// Production wiring: Ollama vision OCR and the `lopdf` backend.
    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConversionError> {
        let engine = OllamaVisionOcr::from_settings(&config.ocr)?;
        Ok(Self::new(Arc::new(engine), Arc::new(LopdfBackend), config))
    }

    pub async fn extract(
        &self,
        document: RawDocument,
        ctx: &ExtractionContext,
    ) -> Result<NormalizedText, ConversionError> {
        let span = tracing::info_span!("extract_document", kind = document.kind().as_str());
        let result = self.extract_inner(document, ctx).instrument(span).await;

        match &result {
            Ok(text) => {
                ctx.progress.finish(ProgressStatus::Done);
                tracing::info!(chars = text.as_str().len(), "Extraction complete");
            }
            Err(e) if e.is_cancelled() => {
                ctx.progress.finish(ProgressStatus::Cancelled);
                tracing::debug!("Extraction cancelled");
            }
            Err(e) => {
                ctx.progress.finish(ProgressStatus::Error);
                tracing::warn!(kind = ?e.kind, error = %e, "Extraction failed");
            }
        }
        result
    }

    async fn extract_inner(
        &self,
        document: RawDocument,
        ctx: &ExtractionContext,
    ) -> Result<NormalizedText, ConversionError> {
        ctx.check_cancelled()?;

        let raw = match document {
            RawDocument::Text(text) => {
                ctx.report(0, ProgressStatus::Preparing);
                text
            }
            RawDocument::File(file) => match file.kind() {
                MediaKind::Image => {
                    ctx.status("Reading text from image");
                    self.image
                        .extract_from_image(&file, ctx, ProgressRange::FULL)
                        .await?
                }
                MediaKind::Pdf => self.pdf.extract_from_pdf(&file, ctx).await?,
                MediaKind::Text => String::from_utf8(file.bytes.to_vec())
                    .map_err(|e| ExtractionError::EncodingError(e.to_string()))?,
                MediaKind::Other => {
                    return Err(ConversionError::validation(format!(
                        "Unsupported file type: {}",
                        file.media_type
                    )));
                }
            },
        };

        ctx.check_cancelled()?;
        let normalized = normalize(&raw);
        if normalized.is_empty() {
            return Err(ConversionError::empty_input());
        }
        Ok(NormalizedText::new(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdfSettings;
    use crate::pipeline::error::ConversionErrorKind;
    use crate::pipeline::extraction::progress::ExtractionProgress;
    use crate::pipeline::extraction::types::FileDocument;
    use crate::testing::{png_bytes, recording_context, MockOcrEngine, MockPdfBackend};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn orchestrator(engine: MockOcrEngine, backend: MockPdfBackend) -> ExtractionOrchestrator {
        let config = ConverterConfig {
            pdf: PdfSettings {
                load_timeout_ms: 200,
                overall_timeout_ms: 1_000,
                ..PdfSettings::default()
            },
            ..ConverterConfig::default()
        };
        ExtractionOrchestrator::new(Arc::new(engine), Arc::new(backend), &config)
    }

    fn assert_well_formed(events: &[ExtractionProgress], terminal: ProgressStatus) {
        assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
        let last = events.last().expect("at least one event");
        assert_eq!(last.status, terminal);
        assert_eq!(events.iter().filter(|e| e.status.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn pasted_text_is_normalized() {
        let orch = orchestrator(MockOcrEngine::new("unused"), MockPdfBackend::with_pages(vec![]));
        let (ctx, events) = recording_context();

        let text = orch
            .extract(RawDocument::text("2  cups flour\r\n\r\n\r\n\r\nBake 20\nminutes"), &ctx)
            .await
            .unwrap();
        assert_eq!(text.as_str(), "2 cups flour\n\nBake 20 minutes");

        let events = events.lock().unwrap();
        assert_well_formed(&events, ProgressStatus::Done);
        assert_eq!(events.last().unwrap().percent, 100);
    }

    #[tokio::test]
    async fn image_goes_through_ocr() {
        let orch = orchestrator(
            MockOcrEngine::new("Crumpets\n200 g  flour"),
            MockPdfBackend::with_pages(vec![]),
        );
        let (ctx, events) = recording_context();

        let doc = RawDocument::File(FileDocument::new(png_bytes(), "image/png"));
        let text = orch.extract(doc, &ctx).await.unwrap();
        assert_eq!(text.as_str(), "Crumpets\n200g flour");

        let events = events.lock().unwrap();
        assert_well_formed(&events, ProgressStatus::Done);
        assert!(events.iter().any(|e| e.status == ProgressStatus::Recognizing));
    }

    #[tokio::test]
    async fn pdf_goes_through_pdf_extractor() {
        let page = "Shortbread\nIngredients:\n- 125 g butter\n- 55 g caster sugar\n- 180 g plain flour";
        let orch = orchestrator(MockOcrEngine::new("unused"), MockPdfBackend::with_pages(vec![page]));
        let (ctx, events) = recording_context();

        let doc = RawDocument::File(FileDocument::new(b"%PDF-1.7".to_vec(), "application/pdf"));
        let text = orch.extract(doc, &ctx).await.unwrap();
        assert!(text.as_str().contains("125g butter"));

        assert_well_formed(&events.lock().unwrap(), ProgressStatus::Done);
    }

    #[tokio::test]
    async fn unsupported_type_is_validation_error() {
        let orch = orchestrator(MockOcrEngine::new("unused"), MockPdfBackend::with_pages(vec![]));
        let (ctx, events) = recording_context();

        let doc = RawDocument::File(FileDocument::new(b"PK\x03\x04".to_vec(), "application/zip"));
        let err = orch.extract(doc, &ctx).await.unwrap_err();
        assert_eq!(err.kind, ConversionErrorKind::ValidationError);
        assert!(err.message.contains("application/zip"));

        assert_well_formed(&events.lock().unwrap(), ProgressStatus::Error);
    }

    #[tokio::test]
    async fn oversized_pdf_rejected_citing_limit() {
        let backend = MockPdfBackend::with_pages(vec!["never read"]);
        let probe = backend.probe();
        let orch = orchestrator(MockOcrEngine::new("unused"), backend);

        let doc = RawDocument::File(FileDocument::new(vec![0u8; 9_000_000], "application/pdf"));
        let err = orch
            .extract(doc, &ExtractionContext::detached())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ConversionErrorKind::ValidationError);
        assert!(err.message.contains(&(8 * 1024 * 1024).to_string()));
        assert_eq!(probe.loads(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_result_is_empty_input() {
        let orch = orchestrator(MockOcrEngine::new(" \n\t "), MockPdfBackend::with_pages(vec![]));
        let doc = RawDocument::File(FileDocument::new(png_bytes(), "image/png"));
        let err = orch
            .extract(doc, &ExtractionContext::detached())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ConversionErrorKind::EmptyInput);
    }

    #[tokio::test]
    async fn cancellation_ends_with_single_cancelled_event() {
        let orch = orchestrator(
            MockOcrEngine::new("late").with_delay_ms(300),
            MockPdfBackend::with_pages(vec![]),
        );
        let (ctx, events) = recording_context();
        let trigger = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let doc = RawDocument::File(FileDocument::new(png_bytes(), "image/png"));
        let err = orch.extract(doc, &ctx).await.unwrap_err();
        assert!(err.is_cancelled());

        tokio::time::sleep(Duration::from_millis(350)).await;
        let events = events.lock().unwrap();
        assert_well_formed(&events, ProgressStatus::Cancelled);
        assert!(events.iter().all(|e| e.percent < 100));
    }

    #[tokio::test]
    async fn status_messages_reach_sink() {
        let page = "x".repeat(80);
        let orch = orchestrator(
            MockOcrEngine::new("unused"),
            MockPdfBackend::with_pages(vec![page.as_str()]),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ExtractionContext::detached().with_status_sink(tx);

        let doc = RawDocument::File(FileDocument::new(b"%PDF".to_vec(), "application/pdf"));
        orch.extract(doc, &ctx).await.unwrap();

        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        assert!(messages.contains(&"Reading page 1 of 1".to_string()));
    }
}
