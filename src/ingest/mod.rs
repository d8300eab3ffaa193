// src/ingest/mod.rs
pub mod config;
pub mod detect;
pub mod fetch;
pub mod normalize;
pub mod scheduler;
pub mod timestamp;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::detect::DetectionError;
use crate::ingest::fetch::{FetchError, Fetcher};
use crate::ingest::types::{CanonicalEvent, Dialect};

/// One-time metrics registration (so series show up before the first tick).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_cycles_total", "Completed polling cycles.");
        describe_counter!("ingest_fetch_errors_total", "Feed fetches that failed.");
        describe_counter!(
            "ingest_detect_errors_total",
            "Feed bodies that matched neither Atom nor RSS."
        );
        describe_counter!("ingest_events_total", "Canonical events produced.");
        describe_counter!(
            "ingest_points_written_total",
            "Points accepted by the time-series store."
        );
        describe_counter!(
            "ingest_write_errors_total",
            "Points dropped after a failed write."
        );
        describe_histogram!("ingest_parse_ms", "Feed decode time in milliseconds.");
        describe_gauge!(
            "ingest_cycle_last_run_ts",
            "Unix ts when the last polling cycle finished."
        );
    });
}

/// Why a source produced nothing this cycle.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// Fetch, detect and normalize one source.
pub async fn ingest_source<F: Fetcher + ?Sized>(
    fetcher: &F,
    url: &str,
) -> Result<(Dialect, Vec<CanonicalEvent>), IngestError> {
    tracing::info!(source = %url, "getting data from feed");
    let body = fetcher.fetch(url).await.inspect_err(|_| {
        counter!("ingest_fetch_errors_total").increment(1);
    })?;

    let t0 = std::time::Instant::now();
    let feed = detect::decode(&body).inspect_err(|_| {
        counter!("ingest_detect_errors_total").increment(1);
    })?;
    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    let dialect = feed.dialect();
    tracing::info!("{} items returned from {} ({})", feed.len(), dialect, url);

    let events = normalize::normalize(feed, url);
    counter!("ingest_events_total").increment(events.len() as u64);
    Ok((dialect, events))
}
