//! `POST /api/analyze`: lab report upload or manual entry.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::Engine;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse};
use crate::models::LabReport;
use crate::pipeline::analysis::{AnalysisInput, ReportSource};
use crate::pipeline::llm::DocumentPayload;
use crate::pipeline::transcribe::resolve_mime_type;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub user_id: String,
    pub document: Option<DocumentUpload>,
    pub text: Option<String>,
    #[serde(default)]
    pub symptoms: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpload {
    /// Base64, optionally as a data URL (`data:application/pdf;base64,...`).
    pub data: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// Analyze a report and store it as the user's latest.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LabReport>>, ApiError> {
    let Json(payload) = payload?;
    let input = into_analysis_input(payload)?;

    let analyzer = ctx.analyzer();
    let report = tokio::task::spawn_blocking(move || analyzer.analyze(&input)).await??;
    Ok(Json(ApiResponse::ok(report)))
}

fn into_analysis_input(payload: AnalyzeRequest) -> Result<AnalysisInput, ApiError> {
    let source = match (payload.document, payload.text) {
        (Some(document), None) => ReportSource::Document(decode_document(document)?),
        (None, Some(text)) => ReportSource::Text(text),
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Provide either document or text, not both".into(),
            ))
        }
        (None, None) => {
            return Err(ApiError::BadRequest("Either document or text is required".into()))
        }
    };

    Ok(AnalysisInput {
        user_id: payload.user_id,
        source,
        symptoms: payload.symptoms,
    })
}

fn decode_document(upload: DocumentUpload) -> Result<DocumentPayload, ApiError> {
    let (prefix_mime, encoded) = split_data_url(&upload.data);
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid document data: {e}")))?;

    let declared = upload.mime_type.as_deref().or(prefix_mime);
    let mime_type = resolve_mime_type(declared, upload.file_name.as_deref())
        .or_else(|| sniff_mime_type(&bytes).map(String::from))
        .ok_or_else(|| ApiError::BadRequest("Could not determine document type".into()))?;

    Ok(DocumentPayload { bytes, mime_type })
}

/// Split `data:<mime>;base64,<payload>` into its MIME type and payload.
/// Anything else is treated as bare base64.
fn split_data_url(data: &str) -> (Option<&str>, &str) {
    match data.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((meta, payload)) => {
            let mime = meta.split(';').next().filter(|m| !m.is_empty());
            (mime, payload)
        }
        None => (None, data),
    }
}

/// Detect a MIME type from magic bytes.
fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        match &bytes[8..12] {
            b"heic" | b"heix" => Some("image/heic"),
            b"mif1" | b"msf1" => Some("image/heif"),
            _ => None,
        }
    } else {
        None
    }
}
