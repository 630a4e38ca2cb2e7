//! HTTP query service.
//!
//! Loads the index once at startup and answers questions against it. The
//! index is read-only after load, so concurrent requests share it through
//! an `Arc` without locking.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | `{"question": "..."}` → `{"answer": "...", "sources": [...]}` |
//! | `GET`  | `/health` | Health check (returns version and chunk count) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `query_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the service directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::ask::{AskResponse, QueryEngine};
use crate::config::Config;

#[derive(Clone)]
struct AppState {
    engine: Arc<QueryEngine>,
    /// Due-date format for review notes in responses.
    review_format: Arc<str>,
}

/// `policyctx serve`: bind to `[server].bind` and serve until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = QueryEngine::from_config(config)?;
    info!(
        chunks = engine.index().len(),
        model = engine.index().model_name().unwrap_or("keyword"),
        "index loaded"
    );

    let app = router(Arc::new(engine), &config.review.server_format);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "policy query server listening");
    println!("Policy query server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(engine: Arc<QueryEngine>, review_format: &str) -> Router {
    let state = AppState {
        engine,
        review_format: Arc::from(review_format),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn query_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "query_error",
        message: message.into(),
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    state
        .engine
        .ask(&request.question, None, &state.review_format)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "query failed");
            query_error(e.to_string())
        })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks: state.engine.index().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::ExtractiveAnswerer;
    use crate::embedding::DisabledProvider;
    use crate::index::PolicyIndex;
    use crate::models::{DocumentChunk, MetadataRecord};
    use crate::review::ISO_FORMAT;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app() -> Router {
        let chunk = DocumentChunk {
            id: "c1".to_string(),
            chunk_index: 0,
            source_filename: "airway.pdf".to_string(),
            content: "Airway checks are hourly.".to_string(),
            hash: String::new(),
            metadata: MetadataRecord {
                filename: "airway.pdf".to_string(),
                policy_number: "09-001-00".to_string(),
                policy_name: "Airway Management".to_string(),
                effective_date: "2019-05-01".to_string(),
                review_due_date: "2099-01-01".to_string(),
                document_type: "Policy".to_string(),
            },
        };
        let index = PolicyIndex::build(vec![chunk], &DisabledProvider, 64)
            .await
            .unwrap();
        let engine = QueryEngine::new(
            index,
            Box::new(DisabledProvider),
            Box::new(ExtractiveAnswerer),
            4,
        );
        router(Arc::new(engine), ISO_FORMAT)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_ask(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn ask_returns_answer_and_sources() {
        let response = app()
            .await
            .oneshot(post_ask(serde_json::json!({"question": "How often are airway checks?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["answer"], "Airway checks are hourly.");
        assert_eq!(json["sources"][0]["policy_number"], "09-001-00");
        assert_eq!(json["sources"][0]["review"]["status"], "ok");
    }

    #[tokio::test]
    async fn empty_question_is_bad_request() {
        let response = app()
            .await
            .oneshot(post_ask(serde_json::json!({"question": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn health_reports_chunk_count() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["chunks"], 1);
    }
}
