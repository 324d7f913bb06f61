//! Vision OCR engine: reads recipe text from photos and rendered PDF pages
//! through a local Ollama vision model (`/api/generate` with a base64 image).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;
use crate::config::OcrSettings;

const SYSTEM_PROMPT: &str = "\
You are a text extractor for recipe photos and scanned cookbook pages. \
Transcribe ALL visible text exactly as written, keeping line breaks, \
quantities, units and numbered steps. Do not add or summarize anything.";

const USER_PROMPT: &str = "\
Transcribe all visible text in this image. Output plain text only.";

pub struct OllamaVisionOcr {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaVisionOcr {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::OcrProcessing(format!("HTTP client error: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout,
        })
    }

    pub fn from_settings(settings: &OcrSettings) -> Result<Self, ExtractionError> {
        Self::new(
            &settings.ollama_url,
            &settings.vision_model,
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    images: Vec<String>,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl OcrEngine for OllamaVisionOcr {
    async fn recognize(
        &self,
        image_bytes: &[u8],
        on_progress: &(dyn Fn(f32) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<OcrPageResult, ExtractionError> {
        let start = Instant::now();
        on_progress(0.0);

        let body = GenerateRequest {
            model: &self.model,
            prompt: USER_PROMPT,
            system: SYSTEM_PROMPT,
            images: vec![base64::engine::general_purpose::STANDARD.encode(image_bytes)],
            stream: false,
        };
        let url = format!("{}/api/generate", self.base_url);
        let request = self.client.post(&url).json(&body).send();

        // The HTTP call has no cancellation hook of its own; dropping it aborts the request.
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractionError::Cancelled),
            sent = request => sent,
        };
        let response = sent.map_err(|e| {
            if e.is_connect() {
                ExtractionError::OcrProcessing(format!(
                    "Vision OCR is not reachable at {}",
                    self.base_url
                ))
            } else if e.is_timeout() {
                ExtractionError::timeout("Vision OCR", self.timeout)
            } else {
                ExtractionError::OcrProcessing(format!("Vision OCR request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::OcrProcessing(format!(
                "Vision OCR returned error (status {}): {body}",
                status.as_u16()
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ExtractionError::OcrProcessing(format!("Malformed vision OCR response: {e}"))
        })?;

        let text = parsed.response.trim().to_string();
        let confidence = heuristic_confidence(&text);
        on_progress(1.0);

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            confidence,
            "Vision OCR complete"
        );

        Ok(OcrPageResult { text, confidence })
    }

    fn engine_name(&self) -> &str {
        &self.model
    }
}

/// Vision models report no confidence; estimate it from output length,
/// with a small bonus for list structure. Capped at 0.95.
fn heuristic_confidence(text: &str) -> f32 {
    let len = text.len();
    let base: f32 = match len {
        0 => return 0.0,
        1..=49 => 0.2,
        50..=199 => 0.4,
        200..=499 => 0.6,
        _ => 0.8,
    };

    let has_list = text
        .lines()
        .any(|l| l.trim_start().starts_with("- ") || l.trim_start().starts_with("* "));
    let bonus = if has_list { 0.05 } else { 0.0 };

    (base + bonus).min(0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve_once, serve_once_after};
    use std::sync::{Arc, Mutex};

    fn progress_sink() -> (Arc<Mutex<Vec<f32>>>, impl Fn(f32) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |f| sink.lock().unwrap().push(f))
    }

    #[tokio::test]
    async fn sends_base64_image_and_returns_text() {
        let (url, request) =
            serve_once(200, r#"{"response": "  2 cups flour\n1 tsp salt  ", "done": true}"#).await;
        let ocr = OllamaVisionOcr::new(&url, "llama3.2-vision", Duration::from_secs(5)).unwrap();
        let (seen, on_progress) = progress_sink();

        let result = ocr
            .recognize(b"\x89PNG fake", &on_progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.text, "2 cups flour\n1 tsp salt");
        assert!(result.confidence > 0.0);
        assert_eq!(*seen.lock().unwrap(), vec![0.0, 1.0]);

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /api/generate"));
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG fake");
        assert!(raw.contains(&encoded));
        assert!(raw.contains("\"stream\":false"));
    }

    #[tokio::test]
    async fn error_status_is_ocr_error() {
        let (url, _request) = serve_once(404, r#"{"error":"model not found"}"#).await;
        let ocr = OllamaVisionOcr::new(&url, "missing-model", Duration::from_secs(5)).unwrap();
        let (_seen, on_progress) = progress_sink();

        let result = ocr
            .recognize(b"img", &on_progress, &CancellationToken::new())
            .await;
        match result {
            Err(ExtractionError::OcrProcessing(msg)) => {
                assert!(msg.contains("404"));
                assert!(msg.contains("model not found"));
            }
            other => panic!("expected OCR error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_engine_is_timeout() {
        let (url, _request) =
            serve_once_after(Duration::from_secs(3), 200, r#"{"response": "late"}"#).await;
        let ocr =
            OllamaVisionOcr::new(&url, "llama3.2-vision", Duration::from_millis(200)).unwrap();
        let (seen, on_progress) = progress_sink();

        let result = ocr
            .recognize(b"img", &on_progress, &CancellationToken::new())
            .await;
        match result {
            Err(ExtractionError::Timeout { phase, secs }) => {
                assert_eq!(phase, "Vision OCR");
                assert!((secs - 0.2).abs() < 1e-9);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(*seen.lock().unwrap(), vec![0.0]);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let ocr = OllamaVisionOcr::new(
            "http://127.0.0.1:9",
            "llama3.2-vision",
            Duration::from_secs(5),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_seen, on_progress) = progress_sink();

        let result = ocr.recognize(b"img", &on_progress, &cancel).await;
        assert!(matches!(result, Err(ExtractionError::Cancelled)));
    }

    #[test]
    fn confidence_grows_with_content() {
        assert_eq!(heuristic_confidence(""), 0.0);
        assert!(heuristic_confidence("short") < heuristic_confidence(&"flour ".repeat(50)));
        assert!(heuristic_confidence(&"- sugar\n".repeat(200)) <= 0.95);
    }
}
