//! `GET /api/users/:user_id/report`: latest stored report.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse};
use crate::db::get_latest_report;
use crate::models::LabReport;
use crate::pipeline::analysis::validate_user_id;

pub async fn latest(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<LabReport>>, ApiError> {
    let user_id = validate_user_id(&user_id)?.to_string();
    let db = ctx.db.clone();
    let lookup_id = user_id.clone();
    let report = tokio::task::spawn_blocking(move || {
        let conn = db.open()?;
        get_latest_report(&conn, &lookup_id)
    })
    .await??
    .ok_or_else(|| ApiError::NotFound(format!("No lab report for user {user_id}")))?;

    Ok(Json(ApiResponse::ok(report)))
}
