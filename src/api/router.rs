//! HTTP router.
//!
//! Routes that can reach the inference service sit behind the admission
//! middleware; health and report reads do not.
//!
//! Layers (outermost → innermost):
//! CORS → trace → body limit → [Extension → admission] → handler
//!
//! The body limit is enforced by the extractors, so an oversized upload is
//! rejected through `ApiError` with the usual JSON envelope.

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::error::ApiError;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Headroom over the encoded document for the JSON envelope and manual text.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Largest request body accepted, given the decoded document ceiling.
pub fn request_body_limit(max_document_bytes: usize) -> usize {
    max_document_bytes.div_ceil(3) * 4 + BODY_OVERHEAD_BYTES
}

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the admission
/// layer). Handlers use `State<ApiContext>`.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = request_body_limit(ctx.config.max_document_bytes);

    let admitted = Router::new()
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/users/:user_id/questions", post(endpoints::followup::questions))
        .route("/users/:user_id/insights", post(endpoints::followup::insights))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/users/:user_id/report", get(endpoints::reports::latest))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .nest("/api", admitted.merge(open))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("No such route".into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use base64::Engine;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{test_config, ServiceConfig};
    use crate::db::Database;
    use crate::pipeline::llm::MockLlmClient;
    use crate::pipeline::pdf::{MockPdfRenderer, MOCK_PAGE_PNG};

    const EXTRACTION_JSON: &str = r#"{"biomarkers":[
        {"name":"LDL","value":162,"unit":"mg/dL","status":"warning"},
        {"name":"Glucose","value":88,"unit":"mg/dL","status":"optimal"}],
        "healthScore":78,"riskLevel":"moderate","summary":"LDL is elevated."}"#;

    const REPORT_TEXT: &str = "LDL Cholesterol 162 mg/dL; Glucose 88 mg/dL";

    struct TestApp {
        _dir: tempfile::TempDir,
        ctx: ApiContext,
        mock: Arc<MockLlmClient>,
    }

    impl TestApp {
        fn new(mock: MockLlmClient) -> Self {
            Self::with_config(mock, |_| {})
        }

        fn with_config(mock: MockLlmClient, tweak: impl FnOnce(&mut ServiceConfig)) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("labscore.db");
            let db = Database::initialize(&path).unwrap();
            let mut config = test_config(&path);
            tweak(&mut config);
            let mock = Arc::new(mock);
            Self {
                ctx: ApiContext::new(config, db, mock.clone())
                    .with_renderer(Arc::new(MockPdfRenderer::new(1))),
                mock,
                _dir: dir,
            }
        }

        async fn send(&self, req: Request<Body>) -> Response {
            api_router(self.ctx.clone()).oneshot(req).await.unwrap()
        }
    }

    fn post_json(uri: &str, client: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", client)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn analyze_text(user: &str, client: &str) -> Request<Body> {
        post_json(
            "/api/analyze",
            client,
            json!({"userId": user, "text": REPORT_TEXT, "symptoms": "fatigue"}),
        )
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_envelope() {
        let app = TestApp::new(MockLlmClient::new(""));
        let response = app.send(get("/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["model"], "medgemma");
    }

    #[tokio::test]
    async fn analyze_then_fetch_report() {
        let app = TestApp::new(MockLlmClient::new(EXTRACTION_JSON));

        let response = app.send(analyze_text("u1", "203.0.113.1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["userId"], "u1");
        assert_eq!(created["data"]["healthScore"], 78.0);
        assert_eq!(created["data"]["riskLevel"], "moderate");
        assert_eq!(created["data"]["biomarkers"][0]["status"], "warning");

        let response = app.send(get("/api/users/u1/report")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = body_json(response).await;
        assert_eq!(fetched["data"]["id"], created["data"]["id"]);
    }

    #[tokio::test]
    async fn missing_report_is_404_envelope() {
        let app = TestApp::new(MockLlmClient::new(""));
        let response = app.send(get("/api/users/nobody/report")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], 404);
    }

    #[tokio::test]
    async fn unknown_route_is_404_envelope() {
        let app = TestApp::new(MockLlmClient::new(""));
        let response = app.send(get("/api/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn questions_follow_analysis() {
        let app = TestApp::new(
            MockLlmClient::new(r#"{"questions": ["Is my LDL a concern?"]}"#)
                .then(Ok(EXTRACTION_JSON.into())),
        );
        app.send(analyze_text("u1", "203.0.113.1")).await;

        let response = app
            .send(post_json("/api/users/u1/questions", "203.0.113.1", json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["kind"], "doctor_questions");
        assert_eq!(json["data"]["source"], "generated");
        assert_eq!(json["data"]["items"][0]["text"], "Is my LDL a concern?");
    }

    #[tokio::test]
    async fn insights_without_report_is_404() {
        let app = TestApp::new(MockLlmClient::new(""));
        let response = app
            .send(post_json("/api/users/u9/insights", "203.0.113.1", json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn quota_exhaustion_returns_429_per_client() {
        let app = TestApp::with_config(MockLlmClient::new(EXTRACTION_JSON), |c| {
            c.short_window.window_secs = 3600;
            c.short_window.limit = 2;
        });

        for _ in 0..2 {
            let response = app.send(analyze_text("u1", "203.0.113.1")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.send(analyze_text("u1", "203.0.113.1")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "3600");
        let json = body_json(response).await;
        assert_eq!(json["code"], "RATE_LIMITED");
        assert_eq!(json["retryAfter"], 3600);
        assert_eq!(app.mock.call_count(), 2);

        // Another client and unmetered routes are unaffected.
        let other = app.send(analyze_text("u2", "198.51.100.9")).await;
        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(app.send(get("/api/health")).await.status(), StatusCode::OK);
        assert_eq!(app.send(get("/api/users/u1/report")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let app = TestApp::new(MockLlmClient::new(EXTRACTION_JSON));
        app.ctx
            .db
            .open()
            .unwrap()
            .execute("DROP TABLE quota_buckets", [])
            .unwrap();

        let response = app.send(analyze_text("u1", "203.0.113.1")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get("Retry-After").is_some());
        assert_eq!(app.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn validation_errors_are_400() {
        let app = TestApp::new(MockLlmClient::new(EXTRACTION_JSON));

        let response = app
            .send(post_json(
                "/api/analyze",
                "203.0.113.1",
                json!({"userId": "u1", "text": "short"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

        let response = app
            .send(post_json("/api/analyze", "203.0.113.1", json!({"userId": "u1"})))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let malformed = Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.send(malformed).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);

        assert_eq!(app.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn image_based_document_is_422() {
        let app = TestApp::new(MockLlmClient::new(EXTRACTION_JSON).then(Ok("   scan   ".into())));
        let data = base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.7 fake");
        let response = app
            .send(post_json(
                "/api/analyze",
                "203.0.113.1",
                json!({"userId": "u1", "document": {"data": data, "fileName": "labs.pdf"}}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "IMAGE_BASED_DOCUMENT");
        assert_eq!(app.mock.call_count(), 1);
        // The PDF went out as its rendered page, not as raw bytes.
        assert_eq!(app.mock.last_image_sizes(), vec![MOCK_PAGE_PNG.len()]);
    }

    #[tokio::test]
    async fn unparseable_extraction_is_500() {
        let app = TestApp::new(MockLlmClient::new("no json here"));
        let response = app.send(analyze_text("u1", "203.0.113.1")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["status"], 500);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = TestApp::with_config(MockLlmClient::new(EXTRACTION_JSON), |c| {
            c.max_document_bytes = 16;
        });
        let huge = "A".repeat(request_body_limit(16) + 1);
        let body = json!({"userId": "u1", "document": {"data": huge, "mimeType": "application/pdf"}})
            .to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap();
        let response = app.send(req).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], 413);
        assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(app.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn oversized_body_without_length_header_is_rejected() {
        let app = TestApp::with_config(MockLlmClient::new(EXTRACTION_JSON), |c| {
            c.max_document_bytes = 16;
        });
        let huge = "A".repeat(request_body_limit(16) + 1);
        let body = json!({"userId": "u1", "document": {"data": huge}});
        let response = app.send(post_json("/api/analyze", "203.0.113.1", body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(app.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn path_user_id_is_trimmed() {
        let app = TestApp::new(MockLlmClient::new(EXTRACTION_JSON));
        let response = app.send(analyze_text(" u1 ", "203.0.113.1")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.send(get("/api/users/%20u1/report")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["userId"], "u1");

        let response = app.send(get("/api/users/%20%20/report")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn body_limit_covers_base64_overhead() {
        let max = 10 * 1024 * 1024;
        assert!(request_body_limit(max) >= max * 4 / 3);
    }
}
