// src/api.rs
//! Read API over the store plus a live passthrough of the source listing.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::ingest::types::TrendingSource;
use crate::model::{StoredItem, TrendingItem};
use crate::sentiment::SentimentLabel;
use crate::store::{ItemFilter, ItemStore, Pagination};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ItemStore>,
    source: Arc<dyn TrendingSource>,
}

impl AppState {
    pub fn new(store: Arc<dyn ItemStore>, source: Arc<dyn TrendingSource>) -> Self {
        Self { store, source }
    }
}

/// Build the router. With `cors_origin` set, browsers from that origin may issue GETs.
pub fn router(state: AppState, cors_origin: Option<&str>) -> Router {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/trending", get(trending))
        .route("/stored_posts", get(stored_posts))
        .route("/filtered_posts", get(filtered_posts))
        .with_state(state);

    match cors_origin.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true),
        ),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "invalid CORS origin, CORS disabled");
            app
        }
        None => app,
    }
}

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

/// Generic 500; the detail goes to the log only.
struct ApiError {
    message: &'static str,
}

impl ApiError {
    fn logged(message: &'static str, detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "{message}");
        Self { message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            status: "error",
            message: Some(self.message),
            data: None,
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

async fn trending(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<TrendingItem>>>, ApiError> {
    let items = state
        .source
        .fetch_trending()
        .await
        .map_err(|e| ApiError::logged("Failed to fetch trending posts", e))?;
    Ok(Json(Envelope {
        status: "success",
        message: Some("Trending posts fetched successfully"),
        data: Some(items),
    }))
}

async fn stored_posts(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<StoredItem>>>, ApiError> {
    let items = state
        .store
        .list(&ItemFilter::default(), None)
        .await
        .map_err(|e| ApiError::logged("Failed to retrieve trending posts from DB", e))?;
    Ok(Json(Envelope {
        status: "success",
        message: None,
        data: Some(items),
    }))
}

/// Raw strings so that junk such as `limit=abc` falls back to defaults instead of a 400.
#[derive(Debug, Default, Deserialize)]
struct FilterQuery {
    sentiment: Option<String>,
    limit: Option<String>,
    page: Option<String>,
}

async fn filtered_posts(
    State(state): State<AppState>,
    Query(q): Query<FilterQuery>,
) -> Result<Json<Vec<StoredItem>>, ApiError> {
    let pagination = Pagination::from_raw(q.limit.as_deref(), q.page.as_deref());

    let sentiment = match q.sentiment.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<SentimentLabel>() {
            Ok(label) => Some(label),
            // no stored item carries an unknown label
            Err(_) => return Ok(Json(Vec::new())),
        },
    };

    let items = state
        .store
        .list(&ItemFilter { sentiment }, Some(pagination))
        .await
        .map_err(|e| ApiError::logged("Failed to find posts", e))?;
    Ok(Json(items))
}
