//! Follow-up content routes, served through the two-tier cache.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse};
use crate::models::{FollowUpContent, FollowUpKind};

/// `POST /api/users/:user_id/questions`
pub async fn questions(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FollowUpContent>>, ApiError> {
    resolve(ctx, user_id, FollowUpKind::DoctorQuestions).await
}

/// `POST /api/users/:user_id/insights`
pub async fn insights(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FollowUpContent>>, ApiError> {
    resolve(ctx, user_id, FollowUpKind::ClinicalInsights).await
}

async fn resolve(
    ctx: ApiContext,
    user_id: String,
    kind: FollowUpKind,
) -> Result<Json<ApiResponse<FollowUpContent>>, ApiError> {
    let service = ctx.followups();
    let content = tokio::task::spawn_blocking(move || service.generate(&user_id, kind)).await??;
    Ok(Json(ApiResponse::ok(content)))
}
