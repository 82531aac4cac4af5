//! Document transcription: raw PDF/image → best-effort plain text.
//!
//! One inference call per document, no chunking. PDFs are rendered to page
//! images first and all pages travel in that single call. Deciding whether the
//! transcript is too thin to use is left to the caller via
//! [`ensure_text_yield`], because the remediation (manual entry) differs
//! from a transport failure (retry).

use std::sync::Arc;

use super::llm::{DocumentPayload, LlmClient};
use super::pdf::{PdfPageRenderer, DEFAULT_RENDER_DPI};
use super::PipelineError;

/// MIME types the inference service accepts as document input.
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
];

const PDF_MIME_TYPE: &str = "application/pdf";

/// Pages rendered from one PDF; longer documents are rejected.
pub const MAX_PDF_PAGES: usize = 20;

const TRANSCRIPTION_SYSTEM_PROMPT: &str = "\
You are a medical document transcriber. You copy text exactly as printed. \
You never summarize, interpret, or comment.";

const TRANSCRIPTION_PROMPT: &str = "\
Extract ALL text from the attached lab report. Preserve the original structure: \
keep table rows on one line, keep test names next to their values, units and \
reference ranges. Output only the transcribed text, with no commentary.";

pub struct DocumentTranscriber {
    llm: Arc<dyn LlmClient>,
    renderer: Arc<dyn PdfPageRenderer>,
    model_name: String,
    max_document_bytes: usize,
}

impl DocumentTranscriber {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        renderer: Arc<dyn PdfPageRenderer>,
        model_name: &str,
        max_document_bytes: usize,
    ) -> Self {
        Self {
            llm,
            renderer,
            model_name: model_name.to_string(),
            max_document_bytes,
        }
    }

    /// Reject payloads that must never reach the inference service.
    pub fn validate(&self, document: &DocumentPayload) -> Result<(), PipelineError> {
        if document.bytes.is_empty() {
            return Err(PipelineError::Validation("Document is empty".into()));
        }
        if document.bytes.len() > self.max_document_bytes {
            return Err(PipelineError::Validation(format!(
                "Document exceeds {} byte limit ({} bytes)",
                self.max_document_bytes,
                document.bytes.len()
            )));
        }
        if !ACCEPTED_MIME_TYPES.contains(&document.mime_type.as_str()) {
            return Err(PipelineError::Validation(format!(
                "Unsupported document type: {}",
                document.mime_type
            )));
        }
        Ok(())
    }

    pub fn transcribe(&self, document: &DocumentPayload) -> Result<String, PipelineError> {
        self.validate(document)?;

        let _span = tracing::info_span!(
            "transcribe_document",
            mime_type = %document.mime_type,
            size = document.bytes.len(),
        )
        .entered();

        let images = self.page_images(document)?;
        let text = self.llm.generate(
            &self.model_name,
            TRANSCRIPTION_PROMPT,
            TRANSCRIPTION_SYSTEM_PROMPT,
            &images,
        )?;
        let text = text.trim().to_string();

        tracing::info!(chars = text.chars().count(), "Document transcribed");
        Ok(text)
    }
}

impl DocumentTranscriber {
    /// Images are sent as uploaded; PDFs become one PNG per page.
    fn page_images(&self, document: &DocumentPayload) -> Result<Vec<Vec<u8>>, PipelineError> {
        if document.mime_type != PDF_MIME_TYPE {
            return Ok(vec![document.bytes.clone()]);
        }

        let pages = self.renderer.page_count(&document.bytes)?;
        if pages == 0 {
            return Err(PipelineError::Validation("PDF has no pages".into()));
        }
        if pages > MAX_PDF_PAGES {
            return Err(PipelineError::Validation(format!(
                "PDF has {pages} pages, at most {MAX_PDF_PAGES} are supported"
            )));
        }

        let images = (0..pages)
            .map(|page| self.renderer.render_page(&document.bytes, page, DEFAULT_RENDER_DPI))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(pages, "PDF rendered for transcription");
        Ok(images)
    }
}

/// Fail with `ImageBasedDocument` when a transcript is too short to analyze.
pub fn ensure_text_yield(text: &str, min_chars: usize) -> Result<(), PipelineError> {
    let chars = text.trim().chars().count();
    if chars < min_chars {
        tracing::info!(chars, min_chars, "Transcript below minimum yield");
        return Err(PipelineError::ImageBasedDocument { chars });
    }
    Ok(())
}

/// Resolve a MIME type from an explicit declaration or, failing that, the file name.
pub fn resolve_mime_type(declared: Option<&str>, file_name: Option<&str>) -> Option<String> {
    let declared = declared
        .map(|m| m.split(';').next().unwrap_or(m).trim().to_lowercase())
        .filter(|m| !m.is_empty());
    declared.or_else(|| {
        file_name
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|mime| mime.essence_str().to_string())
    })
}
