//! `lopdf`-backed PDF backend.
//!
//! Text comes from the page text layer. "Rendering" pulls the largest
//! embedded image XObject off the page and re-encodes it as PNG, which covers
//! scanned cookbook pages and phone-scanner PDFs (one image per page).
//! Vector-only pages have no image to return and fail to render.

use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::types::{PdfBackend, PdfDocumentHandle};
use super::ExtractionError;

pub struct LopdfBackend;

#[async_trait]
impl PdfBackend for LopdfBackend {
    async fn load(
        &self,
        pdf_bytes: Arc<[u8]>,
    ) -> Result<Box<dyn PdfDocumentHandle>, ExtractionError> {
        let document = tokio::task::spawn_blocking(move || parse_document(&pdf_bytes))
            .await
            .map_err(|e| ExtractionError::PdfParsing(format!("PDF worker failed: {e}")))??;
        Ok(Box::new(document))
    }
}

fn parse_document(pdf_bytes: &[u8]) -> Result<LopdfDocument, ExtractionError> {
    let doc = Document::load_mem(pdf_bytes).map_err(|e| {
        let message = e.to_string();
        let lower = message.to_lowercase();
        if lower.contains("encrypt") || lower.contains("decrypt") || lower.contains("password") {
            ExtractionError::PdfParsing("PDF is password protected".into())
        } else {
            ExtractionError::PdfParsing(format!("Failed to parse PDF: {message}"))
        }
    })?;

    if doc.is_encrypted() {
        return Err(ExtractionError::PdfParsing("PDF is password protected".into()));
    }

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    tracing::debug!(pages = pages.len(), "PDF loaded");

    Ok(LopdfDocument {
        doc: Some(Arc::new(doc)),
        pages,
    })
}

/// An opened `lopdf` document. Dropping the `Arc` frees it.
pub struct LopdfDocument {
    doc: Option<Arc<Document>>,
    /// (1-based page number, page object id), in page order.
    pages: Vec<(u32, ObjectId)>,
}

impl LopdfDocument {
    fn page(&self, page_index: usize) -> Result<(Arc<Document>, u32, ObjectId), ExtractionError> {
        let doc = self
            .doc
            .clone()
            .ok_or_else(|| ExtractionError::PdfParsing("PDF document already released".into()))?;
        let &(number, id) = self.pages.get(page_index).ok_or_else(|| {
            ExtractionError::PdfParsing(format!(
                "Page {} not found (PDF has {} pages)",
                page_index + 1,
                self.pages.len()
            ))
        })?;
        Ok((doc, number, id))
    }
}

#[async_trait]
impl PdfDocumentHandle for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn page_text(&self, page_index: usize) -> Result<String, ExtractionError> {
        let (doc, number, _) = self.page(page_index)?;
        tokio::task::spawn_blocking(move || {
            doc.extract_text(&[number]).map_err(|e| {
                ExtractionError::PdfParsing(format!("Text extraction failed on page {number}: {e}"))
            })
        })
        .await
        .map_err(|e| ExtractionError::PdfParsing(format!("PDF worker failed: {e}")))?
    }

    async fn render_page(&self, page_index: usize, _dpi: u32) -> Result<Vec<u8>, ExtractionError> {
        let (doc, number, id) = self.page(page_index)?;
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ExtractionError> {
            let image_bytes = PageImages::new(&doc, id).largest()?;
            let png = reencode_as_png(&image_bytes)?;
            tracing::debug!(
                page = number,
                raw_size = image_bytes.len(),
                png_size = png.len(),
                "Extracted image from PDF page"
            );
            Ok(png)
        })
        .await
        .map_err(|e| ExtractionError::PdfParsing(format!("PDF worker failed: {e}")))?
    }

    fn release(&mut self) {
        self.doc = None;
    }
}

/// Decode any supported image and write it back out as PNG.
fn reencode_as_png(image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    let img = image::load_from_memory(image_bytes).map_err(|e| {
        ExtractionError::ImageProcessing(format!("Failed to decode extracted image: {e}"))
    })?;
    encode_png(&img)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to encode PNG: {e}")))?;
    Ok(out.into_inner())
}

/// Image XObjects reachable from one page's `/Resources`.
struct PageImages<'a> {
    doc: &'a Document,
    page_id: ObjectId,
}

impl<'a> PageImages<'a> {
    fn new(doc: &'a Document, page_id: ObjectId) -> Self {
        Self { doc, page_id }
    }

    /// Follows indirect references; a dangling one resolves to itself.
    fn resolve<'o>(&self, obj: &'o Object) -> &'o Object
    where
        'a: 'o,
    {
        self.doc
            .dereference(obj)
            .map(|(_, target)| target)
            .unwrap_or(obj)
    }

    fn child_dict(&self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        dict.get(key)
            .ok()
            .and_then(|obj| self.resolve(obj).as_dict().ok())
    }

    fn image_streams(&self) -> Result<Vec<&'a Stream>, ExtractionError> {
        let page = self
            .doc
            .get_object(self.page_id)
            .and_then(Object::as_dict)
            .map_err(|e| ExtractionError::PdfParsing(format!("Page object error: {e}")))?;

        let Some(xobjects) = self
            .child_dict(page, b"Resources")
            .and_then(|resources| self.child_dict(resources, b"XObject"))
        else {
            return Ok(Vec::new());
        };

        Ok(xobjects
            .iter()
            .filter_map(|(_, obj)| self.resolve(obj).as_stream().ok())
            .filter(|stream| {
                stream.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(&b"Image"[..])
            })
            .collect())
    }

    /// Encoded bytes of the biggest readable image. Unreadable images are skipped.
    fn largest(&self) -> Result<Vec<u8>, ExtractionError> {
        self.image_streams()?
            .into_iter()
            .filter_map(|stream| match self.encoded_bytes(stream) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable image XObject");
                    None
                }
            })
            .max_by_key(Vec::len)
            .ok_or_else(|| ExtractionError::PdfParsing("No image found on this page".into()))
    }

    /// JPEG streams pass through untouched. Anything else is decompressed and
    /// kept if it is already an image file, or rebuilt from its raw samples.
    fn encoded_bytes(&self, stream: &Stream) -> Result<Vec<u8>, ExtractionError> {
        if filter_names(&stream.dict).any(|name| name == b"DCTDecode") {
            return Ok(stream.content.clone());
        }

        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        if image::guess_format(&content).is_ok() {
            return Ok(content);
        }

        let raster = RawRaster::from_dict(&stream.dict, self.color_components(&stream.dict))?;
        raster.to_png(&content)
    }

    /// Samples per pixel for the image's `/ColorSpace`. Unknown spaces count as RGB.
    fn color_components(&self, dict: &Dictionary) -> u8 {
        let Some(space) = dict.get(b"ColorSpace").ok().map(|obj| self.resolve(obj)) else {
            return 3;
        };

        let (family, param) = match space {
            Object::Name(name) => (name.as_slice(), None),
            Object::Array(parts) => match parts.first() {
                Some(Object::Name(name)) => (name.as_slice(), parts.get(1)),
                _ => return 3,
            },
            _ => return 3,
        };

        match family {
            b"DeviceGray" | b"CalGray" | b"Indexed" => 1,
            b"DeviceCMYK" => 4,
            b"ICCBased" => param
                .and_then(|p| self.resolve(p).as_stream().ok())
                .and_then(|profile| profile.dict.get(b"N").and_then(Object::as_i64).ok())
                .and_then(|n| u8::try_from(n).ok())
                .unwrap_or(3),
            _ => 3,
        }
    }
}

fn filter_names(dict: &Dictionary) -> impl Iterator<Item = &[u8]> {
    let filters: Vec<&[u8]> = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_name().ok()).collect(),
        _ => Vec::new(),
    };
    filters.into_iter()
}

/// Uncompressed 8-bit samples described by an image dictionary.
#[derive(Debug, PartialEq, Eq)]
struct RawRaster {
    width: u32,
    height: u32,
    components: u8,
}

impl RawRaster {
    fn from_dict(dict: &Dictionary, components: u8) -> Result<Self, ExtractionError> {
        let dimension = |label: &str| -> Result<u32, ExtractionError> {
            let value = dict.get(label.as_bytes()).and_then(Object::as_i64).map_err(|_| {
                ExtractionError::ImageProcessing(format!("Image has no integer /{label}"))
            })?;
            u32::try_from(value).ok().filter(|v| *v > 0).ok_or_else(|| {
                ExtractionError::ImageProcessing(format!("Invalid image {label}: {value}"))
            })
        };

        let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
        if bits != 8 {
            return Err(ExtractionError::ImageProcessing(format!(
                "Unsupported bits per component: {bits}"
            )));
        }

        Ok(Self {
            width: dimension("Width")?,
            height: dimension("Height")?,
            components,
        })
    }

    fn byte_len(&self) -> Result<usize, ExtractionError> {
        usize::try_from(self.width)
            .ok()
            .zip(usize::try_from(self.height).ok())
            .and_then(|(w, h)| w.checked_mul(h))
            .and_then(|pixels| pixels.checked_mul(usize::from(self.components)))
            .ok_or_else(|| {
                ExtractionError::ImageProcessing(format!(
                    "Image size {}x{}x{} is too large",
                    self.width, self.height, self.components
                ))
            })
    }

    fn to_png(&self, samples: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        let needed = self.byte_len()?;
        if samples.len() < needed {
            return Err(ExtractionError::ImageProcessing(format!(
                "Raw pixel buffer too small: {} bytes, expected {needed}",
                samples.len()
            )));
        }
        let pixels = samples[..needed].to_vec();
        let (w, h) = (self.width, self.height);

        let img = match self.components {
            1 => image::GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
            3 => image::RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
            // CMYK read as RGBA; OCR does not need true colour.
            4 => image::RgbaImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8),
            _ => None,
        }
        .ok_or_else(|| {
            ExtractionError::ImageProcessing(format!(
                "Unsupported colour components: {}",
                self.components
            ))
        })?;

        encode_png(&img)
    }
}
