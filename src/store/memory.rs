// src/store/memory.rs
//! In-process store gateway. Used for local runs without a database and as the
//! test double for the ingest pipeline and the read API.

use std::sync::Mutex;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use super::{ItemFilter, ItemStore, Pagination, StoreError};
use crate::model::{ItemWrite, StoredItem, WriteOp};

#[derive(Debug, Default)]
pub struct MemoryStore {
    // insertion order doubles as natural listing order
    inner: Mutex<Vec<StoredItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Connection("memory store mutex poisoned".to_string())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StoredItem>, StoreError> {
        let v = self.inner.lock().map_err(|_| Self::poisoned())?;
        Ok(v.iter().find(|it| it.external_id == external_id).cloned())
    }

    async fn upsert_by_external_id(
        &self,
        external_id: &str,
        write: &ItemWrite,
    ) -> Result<(), StoreError> {
        let fields = write
            .fields()
            .ok_or_else(|| StoreError::Write(format!("write for {external_id} has no fields")))?;

        // whole write happens under one lock: read-modify-write is atomic per document
        let mut v = self.inner.lock().map_err(|_| Self::poisoned())?;
        let idx = match v.iter().position(|it| it.external_id == external_id) {
            Some(i) => i,
            None => {
                v.push(StoredItem {
                    id: ObjectId::new().to_hex(),
                    external_id: external_id.to_string(),
                    title: fields.title.clone(),
                    upvote_count: fields.upvote_count,
                    downvote_count: fields.downvote_count,
                    source: fields.source.clone(),
                    permalink: fields.permalink.clone(),
                    inserted_at: fields.inserted_at,
                    sentiment_label: fields.sentiment_label,
                    upvote_history: Vec::new(),
                    downvote_history: Vec::new(),
                });
                v.len() - 1
            }
        };

        let doc = &mut v[idx];
        for op in write.ops() {
            match op {
                WriteOp::Overwrite(f) => {
                    doc.title = f.title.clone();
                    doc.upvote_count = f.upvote_count;
                    doc.downvote_count = f.downvote_count;
                    doc.source = f.source.clone();
                    doc.permalink = f.permalink.clone();
                    doc.inserted_at = f.inserted_at;
                    doc.sentiment_label = f.sentiment_label;
                }
                WriteOp::AppendUpvote(e) => doc.upvote_history.push(e.clone()),
                WriteOp::AppendDownvote(e) => doc.downvote_history.push(e.clone()),
            }
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: Option<Pagination>,
    ) -> Result<Vec<StoredItem>, StoreError> {
        let v = self.inner.lock().map_err(|_| Self::poisoned())?;
        let matching = v.iter().filter(|it| filter.matches(it));
        let out: Vec<StoredItem> = match pagination {
            Some(p) => matching
                .skip(usize::try_from(p.skip()).unwrap_or(usize::MAX))
                .take(usize::try_from(p.limit()).unwrap_or(usize::MAX))
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
