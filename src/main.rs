//! Collector binary: resolve settings, open the store once, poll forever.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use feedflux::config::Cli;
use feedflux::ingest::fetch::HttpFetcher;
use feedflux::sink::{InfluxHttpStore, MemoryStore, Sink, TimeSeriesStore};
use feedflux::telemetry;
use feedflux::Scheduler;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let settings = Cli::parse().into_settings()?;
    telemetry::init_logging(settings.log_format)?;
    if let Some(addr) = settings.metrics_addr {
        telemetry::install_metrics_exporter(addr)?;
    }

    let store: Arc<dyn TimeSeriesStore> = if settings.dry_run {
        tracing::warn!("dry run: points are kept in memory only");
        Arc::new(DryRunStore::default())
    } else {
        Arc::new(
            InfluxHttpStore::connect(&settings.influx)
                .context("could not connect to InfluxDB")?,
        )
    };

    tracing::info!(
        database = %settings.influx.database,
        host = %settings.influx.base_url(),
        "connecting to InfluxDB, creating database"
    );
    store
        .ensure_database(&settings.influx.database)
        .await
        .context("could not create InfluxDB database")?;
    tracing::info!(
        feeds = settings.scheduler.sources.len(),
        "connected to InfluxDB successfully, starting up the collector"
    );

    let fetcher = Arc::new(HttpFetcher::new(settings.influx.timeout)?);
    let sink = Sink::new(store).with_text_placement(settings.text_placement);
    Scheduler::new(settings.scheduler, fetcher, sink).run().await;
    Ok(())
}

/// Memory store that also logs each point as line protocol.
#[derive(Default)]
struct DryRunStore {
    inner: MemoryStore,
}

#[async_trait::async_trait]
impl TimeSeriesStore for DryRunStore {
    async fn ensure_database(&self, name: &str) -> Result<(), feedflux::WriteError> {
        self.inner.ensure_database(name).await
    }

    async fn write_batch(&self, points: &[feedflux::Point]) -> Result<(), feedflux::WriteError> {
        for p in points {
            tracing::info!(target: "feedflux::dry_run", "{p}");
        }
        self.inner.write_batch(points).await?;
        tracing::debug!(retained = self.inner.len(), "dry run store");
        Ok(())
    }
}
