use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::ServerConfig;
use crate::llm::{GeminiClient, TextGenerator};
use crate::report::{self, Report, ReportOptions};

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

/// Shared by every request; the generator is behind an `Arc` so tests can
/// swap in a scripted one
#[derive(Clone)]
pub struct AppState {
    generator: Arc<dyn TextGenerator>,
    options: ReportOptions,
}

impl AppState {
    /// Bundles what every request needs
    ///
    /// # Arguments
    /// * `generator` - Completion source used for both requests of a run
    /// * `options` - Debug echo and chart size settings
    ///
    /// # Returns
    /// * `AppState` - Cheap to clone into each handler
    pub fn new(generator: Arc<dyn TextGenerator>, options: ReportOptions) -> Self {
        AppState { generator, options }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

/// Request-level failure; pipeline problems are reported inside the
/// [`Report`] instead
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status of the response
    status: StatusCode,
    /// Sent back as the `message` field
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::new(e.status(), e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Builds the router
///
/// # Arguments
/// * `state` - Generator and report options shared by all requests
/// * `max_upload_bytes` - Largest request body accepted on any route
///
/// # Returns
/// * `Router` - Ready to serve
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/health", get(|| async { "ok" }))
        .route("/api/analyze", post(analyze_upload))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}

/// Starts the web server and blocks until it stops
pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let generator: Arc<dyn TextGenerator> =
        Arc::new(GeminiClient::new(config.analysis.llm_config()));
    let state = AppState::new(generator, config.analysis.report_options());
    let app = router(state, config.max_upload_bytes());

    let listener = TcpListener::bind(config.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Report>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes));
    }

    let Some((file_name, bytes)) = upload else {
        warn!("Upload request without a '{}' field", UPLOAD_FIELD);
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "No file received. Choose a CSV or Excel (.xlsx) file to upload.",
        ));
    };
    info!("Received {} ({} bytes)", file_name, bytes.len());

    // Completions use a blocking HTTP client
    let generator = Arc::clone(&state.generator);
    let options = state.options;
    let report = tokio::task::spawn_blocking(move || {
        report::analyze(&file_name, &bytes, generator.as_ref(), &options)
    })
    .await
    .map_err(|e| {
        error!("Analysis task failed: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Analysis failed unexpectedly")
    })?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;

    const BOUNDARY: &str = "analystboundary";

    /// Answers by prompt kind so request order does not matter
    struct Canned;

    impl TextGenerator for Canned {
        fn complete(&self, prompt: &str) -> Completion {
            if prompt.contains("data visualization expert") {
                Completion::text(
                    "```json\n[{\"chart_type\":\"bar\",\"x\":\"Category\",\"y\":\"Profit\",\"title\":\"Profit\",\"insight\":\"B leads\"}]\n```",
                )
            } else {
                Completion::text("1. Category B is the most profitable.")
            }
        }
    }

    fn app(max_upload_bytes: usize) -> Router {
        let options = ReportOptions {
            show_raw: false,
            ..ReportOptions::default()
        };
        router(AppState::new(Arc::new(Canned), options), max_upload_bytes)
    }

    fn multipart_body(field: &str, file_name: &str, content: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
            b = BOUNDARY,
        )
    }

    fn upload(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_page_has_upload_form() {
        let response = app(1024)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("<form"));
        assert!(page.contains("/api/analyze"));
    }

    #[tokio::test]
    async fn health_check() {
        let response = app(1024)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn csv_upload_returns_report() {
        let body = multipart_body("file", "profit.csv", "Category,Profit\nA,10\nB,20\nC,5");

        let response = app(1024 * 1024).oneshot(upload(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["file_name"], "profit.csv");
        assert_eq!(report["rows"], 3);
        assert_eq!(report["columns"], 2);
        assert_eq!(report["preview"]["headers"][1], "Profit");
        assert_eq!(report["preview"]["rows"][1][1], 20);
        assert_eq!(report["insights"], "1. Category B is the most profitable.");
        assert_eq!(report["charts"][0]["kind"], "bar");
        assert_eq!(report["charts"][0]["caption"], "Why: B leads");
        assert!(report["charts"][0]["svg"].as_str().unwrap().contains("<svg"));
        assert_eq!(report["notices"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unsupported_file_is_reported_not_rejected() {
        let body = multipart_body("file", "notes.txt", "hello");

        let response = app(1024 * 1024).oneshot(upload(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["notices"][0]["level"], "error");
        assert!(report["insights"].is_null());
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let body = multipart_body("other", "profit.csv", "a,b\n1,2");

        let response = app(1024 * 1024).oneshot(upload(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await;
        assert_eq!(error["status"], "error");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let body = multipart_body("file", "big.csv", &"x,y\n1,2\n".repeat(100));

        let response = app(64).oneshot(upload(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
