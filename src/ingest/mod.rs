// src/ingest/mod.rs
pub mod reconcile;
pub mod reddit;
pub mod scheduler;
pub mod types;

use crate::ingest::types::{ItemError, SourceError, TrendingSource};
use crate::store::ItemStore;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_cycles_total", "Completed or aborted poll cycles.");
        describe_counter!(
            "ingest_fetch_errors_total",
            "Cycles aborted by an auth, transport or response-shape error."
        );
        describe_counter!(
            "ingest_items_fetched_total",
            "Well-formed items returned by the source."
        );
        describe_counter!(
            "ingest_items_skipped_total",
            "Malformed listing entries dropped during parsing."
        );
        describe_counter!(
            "ingest_items_upserted_total",
            "Items written to the store."
        );
        describe_counter!(
            "ingest_item_errors_total",
            "Items skipped because a store read or write failed."
        );
        describe_counter!(
            "ingest_history_appends_total",
            "Vote history entries appended."
        );
        describe_gauge!(
            "ingest_cycle_last_run_ts",
            "Unix ts when the ingest cycle last ran."
        );
    });
}

/// Decode HTML entities and collapse whitespace in a listing title.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Outcome of one cycle that got past the fetch.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub fetched: usize,
    pub upserted: usize,
    pub history_appends: usize,
    pub failed: Vec<ItemError>,
}

/// Fetch one batch and reconcile it item by item, in order.
///
/// A fetch error aborts the cycle and is returned. A store error on one item is
/// logged and collected in the report; the remaining items are still processed.
pub async fn run_cycle(
    source: &dyn TrendingSource,
    store: &dyn ItemStore,
) -> Result<CycleReport, SourceError> {
    ensure_metrics_described();
    counter!("ingest_cycles_total").increment(1);
    gauge!("ingest_cycle_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    let items = match source.fetch_trending().await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, source = source.name(), "fetch failed, cycle aborted");
            counter!("ingest_fetch_errors_total").increment(1);
            return Err(e);
        }
    };
    counter!("ingest_items_fetched_total").increment(items.len() as u64);

    let mut report = CycleReport {
        fetched: items.len(),
        ..CycleReport::default()
    };

    for item in &items {
        let now = chrono::Utc::now();
        match reconcile::reconcile_item(store, item, now).await {
            Ok(write) => {
                report.upserted += 1;
                report.history_appends += write.append_count();
            }
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    external_id = e.external_id.as_str(),
                    error = %e.source,
                    store = store.name(),
                    "item skipped"
                );
                counter!("ingest_item_errors_total").increment(1);
                report.failed.push(e);
            }
        }
    }
    counter!("ingest_items_upserted_total").increment(report.upserted as u64);

    tracing::info!(
        target: "ingest",
        fetched = report.fetched,
        upserted = report.upserted,
        appends = report.history_appends,
        failed = report.failed.len(),
        "ingest cycle finished"
    );
    Ok(report)
}
