use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, HeaderValue, StatusCode}, routing::{get, post}, Json, Router};
use kvindex::{keys, IndexConfig, IndexError, InvertedIndex, SledStore, TextTermCounter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type Index = InvertedIndex<SledStore, TextTermCounter>;

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<Index>,
    pub admin_token: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct TermResponse {
    pub term: String,
    pub documents: BTreeMap<String, u32>,
}

#[derive(Deserialize)]
pub struct CountParams {
    pub doc: String,
    pub term: String,
}

#[derive(Serialize, Deserialize)]
pub struct CountResponse {
    pub doc: String,
    pub term: String,
    pub count: u32,
}

#[derive(Deserialize)]
pub struct IndexedParams {
    pub doc: String,
}

#[derive(Serialize, Deserialize)]
pub struct IndexedResponse {
    pub doc: String,
    pub indexed: bool,
}

#[derive(Deserialize)]
pub struct IndexRequest {
    pub id: String,
    pub body: String,
    /// Keys the document instead of `id` when present and non-empty.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct IndexResponse {
    pub doc: String,
    pub terms: usize,
    pub stale_terms_removed: usize,
    pub replaced: bool,
}

type ApiError = (StatusCode, String);

/// Open the configured sled store and build the router around it.
pub fn build_app(config: &IndexConfig) -> Result<Router> {
    let store = SledStore::from_config(&config.store)?;
    let index = InvertedIndex::with_counter(store, TextTermCounter::new(config.tokenizer.clone()));
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { index: Arc::new(index), admin_token }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/terms/:term", get(term_handler))
        .route("/count", get(count_handler))
        .route("/indexed", get(indexed_handler))
        .route("/index", post(index_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

// CORS: CORS_ALLOW_ORIGIN (comma-separated) or Any
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

pub async fn term_handler(State(state): State<AppState>, Path(term): Path<String>) -> Result<Json<TermResponse>, ApiError> {
    let documents = state.index.counts_for_term(&term).map_err(api_error)?;
    Ok(Json(TermResponse { term, documents }))
}

pub async fn count_handler(State(state): State<AppState>, Query(params): Query<CountParams>) -> Result<Json<CountResponse>, ApiError> {
    let count = state.index.count_in(&params.doc, &params.term).map_err(api_error)?;
    Ok(Json(CountResponse { doc: params.doc, term: params.term, count }))
}

pub async fn indexed_handler(State(state): State<AppState>, Query(params): Query<IndexedParams>) -> Result<Json<IndexedResponse>, ApiError> {
    let indexed = state.index.is_indexed(&params.doc).map_err(api_error)?;
    Ok(Json(IndexedResponse { doc: params.doc, indexed }))
}

pub async fn index_handler(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<IndexRequest>) -> Result<Json<IndexResponse>, ApiError> {
    authorize(&state, &headers)?;
    let doc_id = keys::document_id(&req.id, req.url.as_deref());
    let report = state.index.index_document(doc_id, &req.body).map_err(api_error)?;
    Ok(Json(IndexResponse { doc: report.doc_id, terms: report.terms, stale_terms_removed: report.stale_terms_removed, replaced: report.replaced }))
}

fn api_error(err: IndexError) -> ApiError {
    match err {
        e if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()),
        e @ (IndexError::InvalidTerm(_) | IndexError::InvalidDocumentId) => (StatusCode::BAD_REQUEST, e.to_string()),
        e => {
            tracing::error!(error = %e, "index operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required.as_str() {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
