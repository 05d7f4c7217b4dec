// src/model.rs
//! Domain records shared by the ingest pipeline, the store gateway and the read API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sentiment::SentimentLabel;

/// Ingestion channel every stored item is tagged with.
pub const SOURCE_CHANNEL: &str = "all";

/// Base of the public permalink; the external id is appended as `/comments/<id>`.
pub const PERMALINK_BASE: &str = "https://reddit.com/r/all";

/// A freshly fetched listing entry. Lives for one poll cycle only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingItem {
    pub external_id: String,
    pub title: String,
    pub upvote_count: u64,
    pub downvote_count: u64,
}

/// One recorded change of a vote counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEntry {
    pub value: u64,
    pub timestamp: DateTime<Utc>,
}

/// The persisted, history-tracked record keyed by `external_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    /// Store-assigned identifier, never rewritten after creation.
    pub id: String,
    pub external_id: String,
    pub title: String,
    pub upvote_count: u64,
    pub downvote_count: u64,
    pub source: String,
    pub permalink: String,
    /// Time of the most recent reconcile touch, not of creation.
    pub inserted_at: DateTime<Utc>,
    pub sentiment_label: SentimentLabel,
    #[serde(default)]
    pub upvote_history: Vec<VoteEntry>,
    #[serde(default)]
    pub downvote_history: Vec<VoteEntry>,
}

/// Top-level fields overwritten on every upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFields {
    pub title: String,
    pub upvote_count: u64,
    pub downvote_count: u64,
    pub source: String,
    pub permalink: String,
    pub inserted_at: DateTime<Utc>,
    pub sentiment_label: SentimentLabel,
}

/// A single component of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Overwrite(ItemFields),
    AppendUpvote(VoteEntry),
    AppendDownvote(VoteEntry),
}

/// A described upsert: one overwrite plus zero, one or two history appends.
/// Store gateways apply it as a single atomic document write.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWrite {
    ops: Vec<WriteOp>,
}

impl ItemWrite {
    pub fn overwrite(fields: ItemFields) -> Self {
        Self {
            ops: vec![WriteOp::Overwrite(fields)],
        }
    }

    pub fn append_upvote(mut self, entry: VoteEntry) -> Self {
        self.ops.push(WriteOp::AppendUpvote(entry));
        self
    }

    pub fn append_downvote(mut self, entry: VoteEntry) -> Self {
        self.ops.push(WriteOp::AppendDownvote(entry));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn fields(&self) -> Option<&ItemFields> {
        self.ops.iter().find_map(|op| match op {
            WriteOp::Overwrite(f) => Some(f),
            _ => None,
        })
    }

    pub fn upvote_append(&self) -> Option<&VoteEntry> {
        self.ops.iter().find_map(|op| match op {
            WriteOp::AppendUpvote(e) => Some(e),
            _ => None,
        })
    }

    pub fn downvote_append(&self) -> Option<&VoteEntry> {
        self.ops.iter().find_map(|op| match op {
            WriteOp::AppendDownvote(e) => Some(e),
            _ => None,
        })
    }

    /// Number of history entries this write appends.
    pub fn append_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| !matches!(op, WriteOp::Overwrite(_)))
            .count()
    }
}

/// `<base>/comments/<external_id>`
pub fn permalink_for(external_id: &str) -> String {
    format!("{PERMALINK_BASE}/comments/{external_id}")
}
