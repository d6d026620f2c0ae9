use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use carbon_core::{Gazetteer, RecalculationRequest};
use carbon_estimator::{
    FootprintEstimator, GeminiConfig, GeminiProvider, DEFAULT_ESTIMATOR_TIMEOUT,
    DEFAULT_GEMINI_ENDPOINT,
};
use carbon_observability::AppMetrics;
use carbon_service::RecalculationService;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

const DEFAULT_BIND: &str = "0.0.0.0:5000";
const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

/// Startup settings. Read once; nothing downstream consults the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub gemini: Option<GeminiConfig>,
    pub gazetteer_path: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub estimator_concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            gemini: None,
            gazetteer_path: None,
            allowed_origins: Vec::new(),
            estimator_concurrency: 1,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let timeout = non_empty("CARBON_ESTIMATOR_TIMEOUT_SECONDS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ESTIMATOR_TIMEOUT);
        let endpoint = non_empty("CARBON_GEMINI_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string());
        let gemini = non_empty("GEMINI_API_KEY").map(|api_key| {
            GeminiConfig::new(api_key)
                .with_endpoint(endpoint)
                .with_timeout(timeout)
        });

        let allowed_origins = non_empty("CARBON_ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            bind: non_empty("CARBON_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            gemini,
            gazetteer_path: non_empty("CARBON_GAZETTEER_PATH").map(PathBuf::from),
            allowed_origins,
            estimator_concurrency: non_empty("CARBON_ESTIMATOR_CONCURRENCY")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<RecalculationService<GeminiProvider>>,
    pub metrics: Arc<AppMetrics>,
    pub allowed_origins: Arc<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: carbon_observability::MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    estimator_key_present: bool,
    gazetteer_entries: usize,
    estimator_concurrency: usize,
}

pub fn build_app(config: &ApiConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();

    let mut gazetteer = Gazetteer::builtin();
    if let Some(path) = config.gazetteer_path.as_ref() {
        let overrides = Gazetteer::from_json_file(path)
            .with_context(|| format!("failed to load gazetteer from {}", path.display()))?;
        gazetteer = gazetteer.extended_with(overrides);
    }

    let provider = config
        .gemini
        .clone()
        .map(GeminiProvider::new)
        .transpose()
        .context("failed to initialize estimator client")?;

    let service = RecalculationService::new(
        Arc::new(gazetteer),
        FootprintEstimator::new(provider),
        metrics.clone(),
    )
    .with_concurrency(config.estimator_concurrency);

    let state = ApiState {
        service: Arc::new(service),
        metrics,
        allowed_origins: Arc::new(config.allowed_origins.clone()),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/recalculate", post(recalculate))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            estimator_key_present: state.service.estimator_key_present(),
            gazetteer_entries: state.service.gazetteer().len(),
            estimator_concurrency: state.service.concurrency(),
        },
    };
    (StatusCode::OK, Json(payload))
}

// Malformed bodies decode to an empty request and still answer 200.
async fn recalculate(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    let request = RecalculationRequest::from_slice(&body);
    let response = state.service.recalculate(request).await;
    (StatusCode::OK, Json(response))
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
