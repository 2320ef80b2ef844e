use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ApiError;
use crate::extract::{Category, Dispatcher, ExtractError, Extraction};
use crate::relay;

static INDEX_HTML: &str = include_str!("../static/index.html");

/// Immutable per-process context; nothing here changes between requests
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher<reqwest::Client>>,
    pub relay_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let extract_client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout())
            .build()?;
        // No whole-request timeout here, downloads may legitimately run long
        let relay_client = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(config.timeout())
            .build()?;
        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(extract_client, config)),
            relay_client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExtractionRequest {
    url: String,
    category: Option<Category>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/instagram", post(instagram))
        .route("/api/twitter", post(twitter))
        .route("/api/generic", post(generic))
        .route("/api/extract", post(extract))
        .route("/dl", get(relay::download))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// A body that is not `{url}` JSON fails like an upstream error of `category`
fn parse_request(
    category: Category,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<ExtractionRequest, ApiError> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(rejection) => {
            tracing::warn!(%category, "malformed extraction request: {}", rejection.body_text());
            let error = ExtractError::Upstream(anyhow::anyhow!(rejection.body_text()));
            Err(ApiError::extraction(category, &error))
        }
    }
}

async fn run_extraction(
    state: &AppState,
    category: Category,
    url: &str,
) -> Result<Extraction, ApiError> {
    state
        .dispatcher
        .extract(category, url)
        .await
        .map_err(|e| ApiError::extraction(category, &e))
}

async fn instagram(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = parse_request(Category::Instagram, payload)?;
    let candidates = run_extraction(&state, Category::Instagram, &request.url)
        .await?
        .into_candidates();
    Ok(Json(json!({ "url_list": candidates })).into_response())
}

async fn twitter(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = parse_request(Category::Twitter, payload)?;
    let candidates = run_extraction(&state, Category::Twitter, &request.url)
        .await?
        .into_candidates();
    Ok(Json(json!({ "videos": candidates })).into_response())
}

async fn generic(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = parse_request(Category::Generic, payload)?;
    let body = match run_extraction(&state, Category::Generic, &request.url).await? {
        Extraction::Single(url) => json!({ "url": url }),
        Extraction::Candidates(candidates) => json!({ "videos": candidates }),
    };
    Ok(Json(body).into_response())
}

/// Single endpoint for every category, always answering `{category, videos}`
async fn extract(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = parse_request(Category::Generic, payload)?;
    let category = request
        .category
        .unwrap_or_else(|| Category::detect(&request.url));
    let candidates = run_extraction(&state, category, &request.url)
        .await?
        .into_candidates();
    Ok(Json(json!({ "category": category, "videos": candidates })).into_response())
}
