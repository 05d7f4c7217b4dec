// src/ingest/reconcile.rs
//! Diff a fetched item against its stored counterpart and describe the upsert.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::ingest::types::ItemError;
use crate::model::{
    permalink_for, ItemFields, ItemWrite, StoredItem, TrendingItem, VoteEntry, SOURCE_CHANNEL,
};
use crate::sentiment;
use crate::store::ItemStore;

/// Build the write for `item` given what the store currently holds.
///
/// Fields are always overwritten. A history entry is appended only when the
/// corresponding counter differs from the stored one, so the first sighting
/// records no history and re-applying an identical snapshot appends nothing.
pub fn reconcile(
    item: &TrendingItem,
    existing: Option<&StoredItem>,
    now: DateTime<Utc>,
) -> ItemWrite {
    let fields = ItemFields {
        title: item.title.clone(),
        upvote_count: item.upvote_count,
        downvote_count: item.downvote_count,
        source: SOURCE_CHANNEL.to_string(),
        permalink: permalink_for(&item.external_id),
        inserted_at: now,
        sentiment_label: sentiment::classify(&item.title),
    };
    let mut write = ItemWrite::overwrite(fields);

    if let Some(prev) = existing {
        if prev.upvote_count != item.upvote_count {
            write = write.append_upvote(VoteEntry {
                value: item.upvote_count,
                timestamp: now,
            });
        }
        if prev.downvote_count != item.downvote_count {
            write = write.append_downvote(VoteEntry {
                value: item.downvote_count,
                timestamp: now,
            });
        }
    }
    write
}

/// Load, reconcile and apply one item. A store failure is returned with the
/// item's identity attached and affects only this item.
pub async fn reconcile_item(
    store: &dyn ItemStore,
    item: &TrendingItem,
    now: DateTime<Utc>,
) -> Result<ItemWrite, ItemError> {
    let with_id = |source| ItemError {
        external_id: item.external_id.clone(),
        source,
    };

    let existing = store
        .find_by_external_id(&item.external_id)
        .await
        .map_err(with_id)?;
    let write = reconcile(item, existing.as_ref(), now);
    store
        .upsert_by_external_id(&item.external_id, &write)
        .await
        .map_err(with_id)?;

    let appended = write.append_count() as u64;
    if appended > 0 {
        counter!("ingest_history_appends_total").increment(appended);
    }
    tracing::debug!(
        target: "ingest",
        external_id = item.external_id.as_str(),
        created = existing.is_none(),
        appended,
        "item reconciled"
    );
    Ok(write)
}
