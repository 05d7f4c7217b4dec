// src/store/mongo.rs
//! MongoDB-backed store gateway. One document per external id; every upsert is
//! a single `update_one` so the server reconciles concurrent writers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    options::{ClientOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use serde::Deserialize;

use super::{ItemFilter, ItemStore, Pagination, StoreError};
use crate::model::{ItemFields, ItemWrite, StoredItem, VoteEntry};
use crate::sentiment::SentimentLabel;

const MAX_POOL_SIZE: u32 = 20;
const MIN_POOL_SIZE: u32 = 5;
const MAX_IDLE: Duration = Duration::from_secs(10 * 60);
const PING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    items: Collection<ItemDocument>,
}

impl MongoStore {
    /// Connect, verify with a bounded ping and make sure the key index exists.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let mut opts = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Connection(format!("parse uri: {e}")))?;
        opts.max_pool_size = Some(MAX_POOL_SIZE);
        opts.min_pool_size = Some(MIN_POOL_SIZE);
        opts.max_idle_time = Some(MAX_IDLE);
        if opts.server_selection_timeout.is_none() {
            opts.server_selection_timeout = Some(PING_TIMEOUT);
        }

        let client =
            Client::with_options(opts).map_err(|e| StoreError::Connection(e.to_string()))?;
        let items = client.database(database).collection::<ItemDocument>(collection);
        let store = Self { client, items };

        store.ping().await?;
        store.ensure_indexes().await?;
        tracing::info!(database, collection, "connected to MongoDB");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let model = IndexModel::builder()
            .keys(doc! { "external_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.items
            .create_index(model)
            .await
            .map_err(|e| StoreError::Write(format!("create external_id index: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MongoStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StoredItem>, StoreError> {
        let found = self
            .items
            .find_one(doc! { "external_id": external_id })
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        found.map(StoredItem::try_from).transpose()
    }

    async fn upsert_by_external_id(
        &self,
        external_id: &str,
        write: &ItemWrite,
    ) -> Result<(), StoreError> {
        let update = update_document(write)
            .ok_or_else(|| StoreError::Write(format!("write for {external_id} has no fields")))?;
        self.items
            .update_one(doc! { "external_id": external_id }, update)
            .upsert(true)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: Option<Pagination>,
    ) -> Result<Vec<StoredItem>, StoreError> {
        let mut query = Document::new();
        if let Some(label) = filter.sentiment {
            query.insert("sentiment", label.as_str());
        }

        let find = self.items.find(query).sort(list_order());
        let cursor = match pagination {
            Some(p) => {
                find.skip(p.skip())
                    .limit(i64::try_from(p.limit()).unwrap_or(i64::MAX))
                    .await
            }
            None => find.await,
        }
        .map_err(|e| StoreError::Read(e.to_string()))?;

        let docs: Vec<ItemDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        docs.into_iter().map(StoredItem::try_from).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let admin = self.client.database("admin");
        let ping = admin.run_command(doc! { "ping": 1 });
        match tokio::time::timeout(PING_TIMEOUT, ping).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(StoreError::Connection(e.to_string())),
            Err(_) => Err(StoreError::Connection("ping timed out".to_string())),
        }
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::info!("disconnected from MongoDB");
    }

    fn name(&self) -> &'static str {
        "mongo"
    }
}

/// Insertion order by `_id`, so pages neither repeat nor skip documents.
fn list_order() -> Document {
    doc! { "_id": 1 }
}

/// `$set` for the overwrite plus a `$push` per present history append.
/// `None` when the write carries no overwrite.
pub fn update_document(write: &ItemWrite) -> Option<Document> {
    let fields = write.fields()?;
    let mut update = doc! { "$set": set_document(fields) };

    let mut push = Document::new();
    if let Some(e) = write.upvote_append() {
        push.insert("upvote_history", vote_document(e));
    }
    if let Some(e) = write.downvote_append() {
        push.insert("downvote_history", vote_document(e));
    }
    if !push.is_empty() {
        update.insert("$push", push);
    }
    Some(update)
}

fn set_document(f: &ItemFields) -> Document {
    doc! {
        "title": f.title.as_str(),
        "upvotes": count_to_bson(f.upvote_count),
        "downvotes": count_to_bson(f.downvote_count),
        "source": f.source.as_str(),
        "permalink": f.permalink.as_str(),
        "inserted_at": datetime_to_bson(f.inserted_at),
        "sentiment": f.sentiment_label.as_str(),
    }
}

fn vote_document(e: &VoteEntry) -> Document {
    doc! {
        "value": count_to_bson(e.value),
        "timestamp": datetime_to_bson(e.timestamp),
    }
}

// BSON has no unsigned 64-bit integer
fn count_to_bson(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn count_from_bson(field: &str, v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::Decode(format!("negative {field}: {v}")))
}

fn datetime_to_bson(t: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(t.timestamp_millis())
}

fn datetime_from_bson(t: bson::DateTime) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(t.timestamp_millis())
        .ok_or_else(|| StoreError::Decode(format!("timestamp out of range: {t}")))
}

#[derive(Debug, Deserialize)]
struct ItemDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    external_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    upvotes: i64,
    #[serde(default)]
    downvotes: i64,
    #[serde(default)]
    source: String,
    #[serde(default)]
    permalink: String,
    inserted_at: bson::DateTime,
    sentiment: SentimentLabel,
    #[serde(default)]
    upvote_history: Vec<VoteDocument>,
    #[serde(default)]
    downvote_history: Vec<VoteDocument>,
}

#[derive(Debug, Deserialize)]
struct VoteDocument {
    value: i64,
    timestamp: bson::DateTime,
}

impl TryFrom<VoteDocument> for VoteEntry {
    type Error = StoreError;

    fn try_from(d: VoteDocument) -> Result<Self, Self::Error> {
        Ok(VoteEntry {
            value: count_from_bson("history value", d.value)?,
            timestamp: datetime_from_bson(d.timestamp)?,
        })
    }
}

impl TryFrom<ItemDocument> for StoredItem {
    type Error = StoreError;

    fn try_from(d: ItemDocument) -> Result<Self, Self::Error> {
        let history = |v: Vec<VoteDocument>| -> Result<Vec<VoteEntry>, StoreError> {
            v.into_iter().map(VoteEntry::try_from).collect()
        };
        Ok(StoredItem {
            id: d.id.to_hex(),
            external_id: d.external_id,
            title: d.title,
            upvote_count: count_from_bson("upvotes", d.upvotes)?,
            downvote_count: count_from_bson("downvotes", d.downvotes)?,
            source: d.source,
            permalink: d.permalink,
            inserted_at: datetime_from_bson(d.inserted_at)?,
            sentiment_label: d.sentiment,
            upvote_history: history(d.upvote_history)?,
            downvote_history: history(d.downvote_history)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{permalink_for, SOURCE_CHANNEL};

    fn fields(now: DateTime<Utc>) -> ItemFields {
        ItemFields {
            title: "Hello".into(),
            upvote_count: 15,
            downvote_count: 2,
            source: SOURCE_CHANNEL.into(),
            permalink: permalink_for("x1"),
            inserted_at: now,
            sentiment_label: SentimentLabel::Neutral,
        }
    }

    #[test]
    fn plain_overwrite_has_no_push() {
        let now = Utc::now();
        let update = update_document(&ItemWrite::overwrite(fields(now))).unwrap();
        assert!(update.get_document("$push").is_err());
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_i64("upvotes").unwrap(), 15);
        assert_eq!(set.get_str("sentiment").unwrap(), "neutral");
        assert_eq!(
            set.get_str("permalink").unwrap(),
            "https://reddit.com/r/all/comments/x1"
        );
    }

    #[test]
    fn both_appends_share_one_push_stage() {
        let now = Utc::now();
        let write = ItemWrite::overwrite(fields(now))
            .append_upvote(VoteEntry { value: 15, timestamp: now })
            .append_downvote(VoteEntry { value: 2, timestamp: now });
        let update = update_document(&write).unwrap();
        let push = update.get_document("$push").unwrap();
        assert_eq!(push.len(), 2);
        assert_eq!(
            push.get_document("upvote_history")
                .unwrap()
                .get_i64("value")
                .unwrap(),
            15
        );
        assert!(push.get_document("downvote_history").is_ok());
    }

    fn document(upvotes: i64, downvotes: i64, history_value: i64) -> ItemDocument {
        let now = bson::DateTime::now();
        ItemDocument {
            id: ObjectId::new(),
            external_id: "x1".into(),
            title: "Hello".into(),
            upvotes,
            downvotes,
            source: "all".into(),
            permalink: permalink_for("x1"),
            inserted_at: now,
            sentiment: SentimentLabel::Positive,
            upvote_history: vec![VoteDocument {
                value: history_value,
                timestamp: now,
            }],
            downvote_history: vec![],
        }
    }

    #[test]
    fn document_converts_to_stored_item() {
        let d = document(10, 1, 12);
        let inserted = d.inserted_at;
        let item = StoredItem::try_from(d).unwrap();
        assert_eq!(item.upvote_count, 10);
        assert_eq!(item.downvote_count, 1);
        assert_eq!(item.upvote_history[0].value, 12);
        assert_eq!(
            item.inserted_at.timestamp_millis(),
            inserted.timestamp_millis()
        );
    }

    #[test]
    fn negative_counts_are_decode_errors() {
        for d in [document(-1, 0, 1), document(1, -3, 1), document(1, 0, -7)] {
            assert!(matches!(
                StoredItem::try_from(d),
                Err(StoreError::Decode(_))
            ));
        }
    }

    #[test]
    fn listing_is_ordered_by_id() {
        assert_eq!(list_order(), doc! { "_id": 1 });
    }

    #[tokio::test]
    async fn unreachable_server_fails_connect() {
        let err = MongoStore::connect(
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200",
            "trendlens_test",
            "items",
        )
        .await
        .err()
        .expect("connect must fail without a server");
        assert!(matches!(err, StoreError::Connection(_)), "got {err:?}");
    }
}
