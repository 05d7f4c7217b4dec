// tests/api_http.rs
//
// HTTP-level tests for the read API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use trendlens::api::AppState;
use trendlens::ingest::reconcile::reconcile_item;
use trendlens::ingest::types::{SourceError, TrendingSource};
use trendlens::model::ItemWrite;
use trendlens::store::{ItemFilter, Pagination, StoreError};
use trendlens::{ItemStore, MemoryStore, StoredItem, TrendingItem};

const BODY_LIMIT: usize = 1024 * 1024;

struct FixedSource(Result<Vec<TrendingItem>, ()>);

#[async_trait]
impl TrendingSource for FixedSource {
    async fn fetch_trending(&self) -> Result<Vec<TrendingItem>, SourceError> {
        self.0
            .clone()
            .map_err(|_| SourceError::Authentication("401".into()))
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

struct BrokenStore;

#[async_trait]
impl ItemStore for BrokenStore {
    async fn find_by_external_id(&self, _: &str) -> Result<Option<StoredItem>, StoreError> {
        Err(StoreError::Connection("down".into()))
    }
    async fn upsert_by_external_id(&self, _: &str, _: &ItemWrite) -> Result<(), StoreError> {
        Err(StoreError::Connection("down".into()))
    }
    async fn list(
        &self,
        _: &ItemFilter,
        _: Option<Pagination>,
    ) -> Result<Vec<StoredItem>, StoreError> {
        Err(StoreError::Read("secret connection detail".into()))
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

fn titled(id: usize, title: &str) -> TrendingItem {
    TrendingItem {
        external_id: format!("id{id:02}"),
        title: title.to_string(),
        upvote_count: id as u64,
        downvote_count: 0,
    }
}

/// 12 positive and 12 negative items, interleaved.
async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for i in 0..24 {
        let title = if i % 2 == 0 {
            "Wonderful news, great success"
        } else {
            "Terrible crash, many injured"
        };
        reconcile_item(store.as_ref(), &titled(i, title), Utc::now())
            .await
            .unwrap();
    }
    store
}

fn app(store: Arc<dyn ItemStore>, source: FixedSource) -> Router {
    trendlens::router(AppState::new(store, Arc::new(source)), None)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let (status, bytes) = get(app, uri).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = get(app(seeded_store().await, FixedSource(Ok(vec![]))), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn filtered_posts_defaults_to_first_ten() {
    let (status, v) = get_json(
        app(seeded_store().await, FixedSource(Ok(vec![]))),
        "/filtered_posts",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let arr = v.as_array().expect("bare array");
    assert_eq!(arr.len(), 10);
    assert_eq!(arr[0]["external_id"], "id00");
}

#[tokio::test]
async fn filtered_posts_invalid_paging_falls_back() {
    let store = seeded_store().await;
    for uri in [
        "/filtered_posts?limit=0&page=0",
        "/filtered_posts?limit=-3&page=-1",
        "/filtered_posts?limit=abc&page=",
    ] {
        let (status, v) = get_json(app(store.clone(), FixedSource(Ok(vec![]))), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), 10, "{uri}");
        assert_eq!(arr[0]["external_id"], "id00", "{uri}");
    }
}

#[tokio::test]
async fn filtered_posts_pages_and_filters_by_sentiment() {
    let store = seeded_store().await;

    let (_, v) = get_json(
        app(store.clone(), FixedSource(Ok(vec![]))),
        "/filtered_posts?page=3&limit=10",
    )
    .await;
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 4);
    assert_eq!(arr[0]["external_id"], "id20");

    let (_, v) = get_json(
        app(store.clone(), FixedSource(Ok(vec![]))),
        "/filtered_posts?sentiment=negative&limit=5&page=2",
    )
    .await;
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 5);
    assert!(arr.iter().all(|p| p["sentiment_label"] == "negative"));
    assert_eq!(arr[0]["external_id"], "id11");

    let (status, v) = get_json(
        app(store, FixedSource(Ok(vec![]))),
        "/filtered_posts?sentiment=ecstatic",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn stored_posts_returns_everything_in_envelope() {
    let (status, v) = get_json(
        app(seeded_store().await, FixedSource(Ok(vec![]))),
        "/stored_posts",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "success");
    let data = v["data"].as_array().unwrap();
    assert_eq!(data.len(), 24);
    assert!(data[0].get("upvote_history").is_some());
    assert!(data[0].get("permalink").is_some());
}

#[tokio::test]
async fn trending_passes_through_live_items() {
    let source = FixedSource(Ok(vec![titled(1, "hello")]));
    let (status, v) = get_json(app(Arc::new(MemoryStore::new()), source), "/trending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "success");
    assert_eq!(v["data"][0]["external_id"], "id01");
}

#[tokio::test]
async fn failures_surface_as_generic_500() {
    let (status, v) = get_json(
        app(Arc::new(MemoryStore::new()), FixedSource(Err(()))),
        "/trending",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["status"], "error");

    let (status, bytes) = get(
        app(Arc::new(BrokenStore), FixedSource(Ok(vec![]))),
        "/filtered_posts",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(bytes).unwrap();
    assert!(!body.contains("secret connection detail"));
}
