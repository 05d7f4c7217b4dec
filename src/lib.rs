// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod sentiment;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::reconcile::reconcile;
pub use crate::model::{ItemWrite, StoredItem, TrendingItem, VoteEntry};
pub use crate::sentiment::{classify, SentimentLabel};
pub use crate::store::{ItemStore, MemoryStore, MongoStore};
