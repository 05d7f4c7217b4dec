// src/ingest/types.rs
use crate::model::TrendingItem;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("listing returned HTTP {0}")]
    Status(u16),
    #[error("unexpected response shape: {0}")]
    ResponseShape(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Transport(format!("timed out: {e}"))
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

/// Failure of one item; the rest of the batch carries on.
#[derive(Debug, thiserror::Error)]
#[error("item {external_id}: {source}")]
pub struct ItemError {
    pub external_id: String,
    #[source]
    pub source: StoreError,
}

#[async_trait::async_trait]
pub trait TrendingSource: Send + Sync {
    /// One batch from the hot listing. Malformed entries are dropped, not fatal.
    async fn fetch_trending(&self) -> Result<Vec<TrendingItem>, SourceError>;
    fn name(&self) -> &'static str;
}
