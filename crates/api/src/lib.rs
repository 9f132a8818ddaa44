mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, State};
use axum::http::{Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use mirage_agents::{EngineError, HoneypotAgent, HttpReportSink};
use mirage_core::{EngageRequest, ScoringConfig};
use mirage_observability::AppMetrics;
use mirage_storage::{Archive, SessionStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::rate_limit::ApiRateLimiter;

const SERVICE_NAME: &str = "mirage-honeypot";
const DEFAULT_API_KEY: &str = "dev-mirage-key";
const DEFAULT_REPORT_URL: &str = "http://127.0.0.1:9009/honeypot/final-result";
const DEFAULT_REPORT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<HoneypotAgent<Archive, HttpReportSink>>,
    pub store: Arc<SessionStore>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: ApiRateLimiter,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    active_sessions: usize,
    metrics: mirage_observability::MetricsSnapshot,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualCallbackRequest {
    session_id: Option<String>,
}

pub async fn build_app() -> Result<Router> {
    let metrics = AppMetrics::shared();
    let store = Arc::new(SessionStore::new());

    let archive = if let Ok(database_url) = env::var("MIRAGE_DATABASE_URL") {
        Archive::sqlite(&database_url).await?
    } else {
        Archive::memory()
    };

    let report_url =
        env::var("MIRAGE_REPORT_URL").unwrap_or_else(|_| DEFAULT_REPORT_URL.to_string());
    Url::parse(&report_url).context("MIRAGE_REPORT_URL is not a valid URL")?;
    let report_timeout = Duration::from_secs(
        env::var("MIRAGE_REPORT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REPORT_TIMEOUT_SECONDS),
    );
    let sink = HttpReportSink::new(report_url, report_timeout)?;

    let mut scoring = ScoringConfig::default();
    if let Some(threshold) = env::var("MIRAGE_SCAM_THRESHOLD")
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
    {
        scoring.scam_threshold = threshold.clamp(0.0, 1.0);
    }

    let agent = Arc::new(HoneypotAgent::new(
        store.clone(),
        Arc::new(archive),
        Arc::new(sink),
        scoring,
        metrics.clone(),
    ));

    let api_key = env::var("MIRAGE_API_KEY").unwrap_or_else(|_| DEFAULT_API_KEY.to_string());
    let rate_limit_window = Duration::from_secs(
        env::var("MIRAGE_RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(60),
    );
    let rate_limit_max = env::var("MIRAGE_RATE_LIMIT_MAX")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(120);

    let state = ApiState {
        agent,
        store,
        metrics,
        api_key,
        limiter: ApiRateLimiter::new(rate_limit_window, rate_limit_max),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/honeypot", post(honeypot))
        .route("/api/honeypot/manual-callback", post(manual_callback))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        active_sessions: state.store.active_count(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn honeypot(State(state): State<ApiState>, Json(payload): Json<Value>) -> Response {
    let request: EngageRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("malformed request: {err}"),
            );
        }
    };

    match state.agent.handle_message(request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "reply": outcome.reply
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "honeypot turn failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Processing error: {err}"),
            )
        }
    }
}

async fn manual_callback(
    State(state): State<ApiState>,
    Json(input): Json<ManualCallbackRequest>,
) -> Response {
    let Some(session_id) = input.session_id.filter(|value| !value.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid session ID".to_string());
    };

    match state.agent.manual_dispatch(&session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Callback sent"
            })),
        )
            .into_response(),
        Err(EngineError::UnknownSession(_)) => {
            error_response(StatusCode::BAD_REQUEST, "Invalid session ID".to_string())
        }
        Err(EngineError::AlreadyReported(_)) => error_response(
            StatusCode::CONFLICT,
            "Report already delivered for this session".to_string(),
        ),
        Err(err) => {
            tracing::warn!(session_id = %session_id, error = %err, "manual callback failed");
            error_response(StatusCode::BAD_GATEWAY, "Callback failed".to_string())
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": "error",
            "message": message
        })),
    )
        .into_response()
}

fn is_public_endpoint(path: &str) -> bool {
    path == "/health"
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if request.method() == Method::OPTIONS || is_public_endpoint(path.as_str()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid API key or malformed request".to_string(),
        );
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if request.method() == Method::OPTIONS || is_public_endpoint(path.as_str()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded for this caller".to_string(),
        );
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
