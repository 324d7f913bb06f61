use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::ExtractionError;

/// Input unit of one extraction: pasted text or an uploaded file.
#[derive(Debug, Clone)]
pub enum RawDocument {
    Text(String),
    File(FileDocument),
}

/// An uploaded file with its declared media type.
#[derive(Debug, Clone)]
pub struct FileDocument {
    pub bytes: Arc<[u8]>,
    pub media_type: String,
    pub file_name: Option<String>,
}

impl FileDocument {
    pub fn new(bytes: impl Into<Arc<[u8]>>, media_type: &str) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.to_string(),
            file_name: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_media_type(&self.media_type)
    }
}

impl RawDocument {
    pub fn text(text: &str) -> Self {
        RawDocument::Text(text.to_string())
    }

    /// Read a file from disk, declaring its media type from the extension.
    /// Text files become `RawDocument::Text`.
    pub async fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let bytes = tokio::fs::read(path).await?;
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        if MediaKind::from_media_type(&media_type) == MediaKind::Text {
            let text = String::from_utf8(bytes)
                .map_err(|e| ExtractionError::EncodingError(e.to_string()))?;
            return Ok(RawDocument::Text(text));
        }

        let mut file = FileDocument::new(bytes, &media_type);
        file.file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(RawDocument::File(file))
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            RawDocument::Text(_) => MediaKind::Text,
            RawDocument::File(file) => file.kind(),
        }
    }
}

/// Coarse classification of a declared media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    Image,
    Pdf,
    Other,
}

impl MediaKind {
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" | "application/x-pdf" => MediaKind::Pdf,
            e if e.starts_with("image/") => MediaKind::Image,
            e if e.starts_with("text/") => MediaKind::Text,
            _ => MediaKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Image => "image",
            MediaKind::Pdf => "pdf",
            MediaKind::Other => "other",
        }
    }
}

/// Cleaned text of one extraction. Produced once, treated as a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests).
///
/// `on_progress` receives values in `[0, 1]`. Engines without a cancellation
/// hook may ignore `cancel`; the caller stops observing them once it fires.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(
        &self,
        image_bytes: &[u8],
        on_progress: &(dyn Fn(f32) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<OcrPageResult, ExtractionError>;

    fn engine_name(&self) -> &str;
}

/// PDF parser/renderer abstraction.
#[async_trait]
pub trait PdfBackend: Send + Sync {
    async fn load(&self, pdf_bytes: Arc<[u8]>)
        -> Result<Box<dyn PdfDocumentHandle>, ExtractionError>;
}

/// An opened PDF. Owned by exactly one extraction.
#[async_trait]
pub trait PdfDocumentHandle: Send + Sync {
    fn page_count(&self) -> usize;

    /// Text layer of a page (0-based index).
    async fn page_text(&self, page_index: usize) -> Result<String, ExtractionError>;

    /// Page rendered to an encoded image suitable for OCR.
    async fn render_page(&self, page_index: usize, dpi: u32) -> Result<Vec<u8>, ExtractionError>;

    /// Free the document. Called once by the owning extraction.
    fn release(&mut self);
}
