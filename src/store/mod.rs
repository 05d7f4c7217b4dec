// src/store/mod.rs
//! Store gateway: the narrow read-one / write-one / list surface the ingest
//! pipeline and the read API use against the document store.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::model::{ItemWrite, StoredItem};
use crate::sentiment::SentimentLabel;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_PAGE: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("store read failed: {0}")]
    Read(String),
    #[error("store write failed: {0}")]
    Write(String),
    #[error("stored document is malformed: {0}")]
    Decode(String),
}

/// Query filter for listing. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub sentiment: Option<SentimentLabel>,
}

impl ItemFilter {
    pub fn matches(&self, item: &StoredItem) -> bool {
        self.sentiment
            .map(|s| s == item.sentiment_label)
            .unwrap_or(true)
    }
}

/// 1-indexed page window. Construct through `from_raw` so bad input falls back
/// to the defaults instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: u64,
    page: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
        }
    }
}

impl Pagination {
    /// Non-positive values become the defaults.
    pub fn new(limit: i64, page: i64) -> Self {
        Self {
            limit: u64::try_from(limit)
                .ok()
                .filter(|l| *l > 0)
                .unwrap_or(DEFAULT_LIMIT),
            page: u64::try_from(page)
                .ok()
                .filter(|p| *p > 0)
                .unwrap_or(DEFAULT_PAGE),
        }
    }

    /// Parse raw query strings; anything missing or unparsable is defaulted.
    pub fn from_raw(limit: Option<&str>, page: Option<&str>) -> Self {
        let parse = |s: Option<&str>| s.and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(0);
        Self::new(parse(limit), parse(page))
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// `Ok(None)` is the normal first-sighting outcome.
    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<StoredItem>, StoreError>;

    /// Create-if-absent, else merge; applied as one atomic document write.
    async fn upsert_by_external_id(
        &self,
        external_id: &str,
        write: &ItemWrite,
    ) -> Result<(), StoreError>;

    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: Option<Pagination>,
    ) -> Result<Vec<StoredItem>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release underlying resources at shutdown.
    async fn close(&self) {}

    fn name(&self) -> &'static str;
}
