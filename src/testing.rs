//! Test doubles shared by the unit tests: OCR engine, PDF backend,
//! completion client and a one-shot HTTP server.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::extraction::{
    ExtractionContext, ExtractionError, ExtractionProgress, OcrEngine, OcrPageResult, PdfBackend,
    PdfDocumentHandle, ProgressReporter,
};
use crate::pipeline::structuring::{CompletionClient, CompletionRequest, StructuringError};

/// A small valid grayscale PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
        32,
        32,
        image::Luma([200u8]),
    ));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn recording_context() -> (ExtractionContext, Arc<Mutex<Vec<ExtractionProgress>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let reporter = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));
    (
        ExtractionContext::new(reporter, CancellationToken::new()),
        events,
    )
}

// ── OCR ────────────────────────────────────────────────────────────

pub struct MockOcrEngine {
    text: String,
    fail: Option<String>,
    timed_out: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail: None,
            timed_out: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Self::new("")
        }
    }

    /// Fails the way an engine whose HTTP deadline passed does.
    pub fn timing_out() -> Self {
        Self {
            timed_out: true,
            ..Self::new("")
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn recognize(
        &self,
        _image_bytes: &[u8],
        on_progress: &(dyn Fn(f32) + Send + Sync),
        _cancel: &CancellationToken,
    ) -> Result<OcrPageResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        on_progress(0.5);
        if self.timed_out {
            return Err(ExtractionError::timeout("Vision OCR", Duration::from_secs(120)));
        }
        if let Some(message) = &self.fail {
            return Err(ExtractionError::OcrProcessing(message.clone()));
        }
        on_progress(1.0);
        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: 0.9,
        })
    }

    fn engine_name(&self) -> &str {
        "mock"
    }
}

// ── PDF ────────────────────────────────────────────────────────────

/// Counters shared between a mock backend, its handles and the test.
#[derive(Default)]
pub struct PdfProbe {
    loads: AtomicUsize,
    releases: AtomicUsize,
    text_pages: Mutex<Vec<usize>>,
    rendered_pages: Mutex<Vec<usize>>,
}

impl PdfProbe {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.rendered_pages.lock().unwrap().len()
    }

    pub fn text_pages(&self) -> Vec<usize> {
        self.text_pages.lock().unwrap().clone()
    }

    pub fn rendered_pages(&self) -> Vec<usize> {
        self.rendered_pages.lock().unwrap().clone()
    }
}

pub struct MockPdfBackend {
    pages: Arc<Vec<String>>,
    load_delay: Duration,
    page_delay: Duration,
    renders: bool,
    load_error: Option<String>,
    probe: Arc<PdfProbe>,
}

impl MockPdfBackend {
    pub fn with_pages(pages: Vec<&str>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().map(str::to_string).collect()),
            load_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
            renders: true,
            load_error: None,
            probe: Arc::new(PdfProbe::default()),
        }
    }

    pub fn failing_load(message: &str) -> Self {
        Self {
            load_error: Some(message.to_string()),
            ..Self::with_pages(vec![])
        }
    }

    pub fn with_load_delay_ms(mut self, ms: u64) -> Self {
        self.load_delay = Duration::from_millis(ms);
        self
    }

    pub fn with_page_delay_ms(mut self, ms: u64) -> Self {
        self.page_delay = Duration::from_millis(ms);
        self
    }

    pub fn without_renders(mut self) -> Self {
        self.renders = false;
        self
    }

    pub fn probe(&self) -> Arc<PdfProbe> {
        self.probe.clone()
    }

    pub fn open_handle(&self) -> Box<dyn PdfDocumentHandle> {
        Box::new(MockPdfHandle {
            pages: self.pages.clone(),
            page_delay: self.page_delay,
            renders: self.renders,
            released: false,
            probe: self.probe.clone(),
        })
    }
}

#[async_trait]
impl PdfBackend for MockPdfBackend {
    async fn load(
        &self,
        _pdf_bytes: Arc<[u8]>,
    ) -> Result<Box<dyn PdfDocumentHandle>, ExtractionError> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if let Some(message) = &self.load_error {
            return Err(ExtractionError::PdfParsing(message.clone()));
        }
        Ok(self.open_handle())
    }
}

pub struct MockPdfHandle {
    pages: Arc<Vec<String>>,
    page_delay: Duration,
    renders: bool,
    released: bool,
    probe: Arc<PdfProbe>,
}

#[async_trait]
impl PdfDocumentHandle for MockPdfHandle {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn page_text(&self, page_index: usize) -> Result<String, ExtractionError> {
        self.probe.text_pages.lock().unwrap().push(page_index);
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
        self.pages
            .get(page_index)
            .cloned()
            .ok_or_else(|| ExtractionError::PdfParsing(format!("Page {} not found", page_index + 1)))
    }

    async fn render_page(&self, page_index: usize, _dpi: u32) -> Result<Vec<u8>, ExtractionError> {
        if !self.renders {
            return Err(ExtractionError::PdfParsing(format!(
                "Page {} has no renderable image",
                page_index + 1
            )));
        }
        self.probe.rendered_pages.lock().unwrap().push(page_index);
        Ok(png_bytes())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ── Completion ─────────────────────────────────────────────────────

/// Replays queued replies in order and records every request.
pub struct MockCompletionClient {
    replies: Mutex<VecDeque<Result<String, StructuringError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new(replies: Vec<Result<String, StructuringError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, StructuringError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StructuringError::MalformedResponse("no reply queued".into())))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ── HTTP ───────────────────────────────────────────────────────────

/// Answer the first request on a random local port with `status` and `body`.
///
/// Returns the base URL and a handle resolving to the recorded request as
/// `METHOD /path`, one `name: value` line per header, a blank line, the body.
pub async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<String>) {
    serve_once_after(Duration::ZERO, status, body).await
}

/// Like [`serve_once`], but the reply is held back for `delay`.
pub async fn serve_once_after(
    delay: Duration,
    status: u16,
    body: &str,
) -> (String, JoinHandle<String>) {
    let (tx, rx) = oneshot::channel::<String>();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let status = StatusCode::from_u16(status).unwrap();
    let body = body.to_string();

    let app = Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, request_body: String| {
            let tx = tx.clone();
            let body = body.clone();
            async move {
                let sender = tx.lock().unwrap().take();
                if let Some(sender) = sender {
                    let _ = sender.send(describe_request(&method, &uri, &headers, &request_body));
                }
                tokio::time::sleep(delay).await;
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }
        },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let recorded = tokio::spawn(async move { rx.await.unwrap_or_default() });
    (format!("http://{addr}"), recorded)
}

fn describe_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: &str) -> String {
    let header_lines: Vec<String> = headers
        .iter()
        .map(|(name, value)| format!("{name}: {}", value.to_str().unwrap_or_default()))
        .collect();
    format!("{method} {uri}\n{}\n\n{body}", header_lines.join("\n"))
}
