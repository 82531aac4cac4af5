//! PDF page rendering via Google PDFium.
//!
//! Vision models take raster images, not PDF files, so every PDF upload is
//! rendered page by page to PNG before transcription.
//!
//! `PdfiumRenderer` is stateless (`Send + Sync`). Each operation loads a
//! fresh `Pdfium` instance because the upstream type is `!Send`; the OS
//! caches the library load.

use std::io::Cursor;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use thiserror::Error;

/// Longest rendered edge in pixels.
const MAX_DIMENSION_PX: u32 = 4096;

/// 200 DPI balances legibility and inference time.
pub const DEFAULT_RENDER_DPI: u32 = 200;

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("PDFium library not available: {0}")]
    LibraryUnavailable(String),

    #[error("PDF is password-protected")]
    Encrypted,

    #[error("PDF could not be read: {0}")]
    InvalidPdf(String),

    #[error("Rendering page {page} failed: {reason}")]
    Page { page: usize, reason: String },

    #[error("PNG encoding failed: {0}")]
    Encoding(String),
}

/// Turns PDF bytes into page images.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, RenderError>;

    /// Render one zero-based page to PNG.
    fn render_page(&self, pdf_bytes: &[u8], page_number: usize, dpi: u32)
        -> Result<Vec<u8>, RenderError>;
}

pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Whether the PDFium library can be loaded on this host.
    pub fn check_available() -> Result<(), RenderError> {
        load_pdfium().map(|_| ())
    }
}

/// Discovery order: `PDFIUM_DYNAMIC_LIB_PATH`, next to the executable,
/// then the system library path.
fn load_pdfium() -> Result<Pdfium, RenderError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| RenderError::LibraryUnavailable(format!("{path}: {e}")))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            tracing::debug!(dir = %exe_dir.display(), "Loaded PDFium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        RenderError::LibraryUnavailable(format!(
            "set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

fn map_load_error(e: PdfiumError) -> RenderError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        RenderError::Encrypted
    } else {
        RenderError::InvalidPdf(msg)
    }
}

/// Pixel size for a page at `dpi`, capped to `MAX_DIMENSION_PX` with the
/// aspect ratio kept.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, RenderError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, RenderError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let page_index = u16::try_from(page_number).map_err(|_| RenderError::Page {
            page: page_number,
            reason: "page index exceeds u16".into(),
        })?;
        let page = document.pages().get(page_index).map_err(|e| RenderError::Page {
            page: page_number,
            reason: e.to_string(),
        })?;

        let (width, height) =
            compute_render_dimensions(page.width().value, page.height().value, dpi);
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| RenderError::Page {
                page: page_number,
                reason: e.to_string(),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
        let png = cursor.into_inner();

        tracing::debug!(page = page_number, width, height, png_size = png.len(), "Rendered PDF page");
        Ok(png)
    }
}

/// Mock renderer returning a fixed PNG per page, for tests without PDFium.
pub struct MockPdfRenderer {
    page_count: usize,
}

impl MockPdfRenderer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

impl PdfPageRenderer for MockPdfRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, RenderError> {
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_number: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, RenderError> {
        if page_number >= self.page_count {
            return Err(RenderError::Page {
                page: page_number,
                reason: format!("mock has {} pages", self.page_count),
            });
        }
        Ok(MOCK_PAGE_PNG.to_vec())
    }
}

/// 1x1 white PNG.
pub const MOCK_PAGE_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
    0xCF, 0xC0, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];
