// src/ingest/scheduler.rs
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::fetch::Fetcher;
use crate::ingest::types::Dialect;
use crate::ingest::{ensure_metrics_described, ingest_source, IngestError};
use crate::sink::{DeliveryPolicy, Sink};

#[derive(Clone, Debug)]
pub struct SchedulerCfg {
    /// Feed URLs in the order they are polled each cycle.
    pub sources: Vec<String>,
    pub interval: Duration,
}

/// What happened to one source in one cycle.
#[derive(Debug)]
pub enum SourceOutcome {
    Ingested {
        dialect: Dialect,
        events: usize,
        written: usize,
        dropped: usize,
    },
    Skipped(IngestError),
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub sources: Vec<(String, SourceOutcome)>,
}

impl CycleReport {
    pub fn written(&self) -> usize {
        self.sources
            .iter()
            .map(|(_, o)| match o {
                SourceOutcome::Ingested { written, .. } => *written,
                SourceOutcome::Skipped(_) => 0,
            })
            .sum()
    }

    pub fn dropped(&self) -> usize {
        self.sources
            .iter()
            .map(|(_, o)| match o {
                SourceOutcome::Ingested { dropped, .. } => *dropped,
                SourceOutcome::Skipped(_) => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.sources
            .iter()
            .filter(|(_, o)| matches!(o, SourceOutcome::Skipped(_)))
            .count()
    }
}

/// Sequential fetch → detect → normalize → write over every source, forever.
pub struct Scheduler {
    cfg: SchedulerCfg,
    fetcher: Arc<dyn Fetcher>,
    sink: Sink,
}

impl Scheduler {
    pub fn new(cfg: SchedulerCfg, fetcher: Arc<dyn Fetcher>, sink: Sink) -> Self {
        Self { cfg, fetcher, sink }
    }

    /// One pass over all sources in list order. A failing source is skipped;
    /// the others still run.
    pub async fn run_cycle(&self) -> CycleReport {
        ensure_metrics_described();
        let mut report = CycleReport::default();

        for url in &self.cfg.sources {
            let outcome = match ingest_source(self.fetcher.as_ref(), url).await {
                Ok((dialect, events)) => {
                    let mut written = 0usize;
                    let mut dropped = 0usize;
                    for ev in &events {
                        match self.sink.write(ev).await {
                            Ok(()) => {
                                written += 1;
                                counter!("ingest_points_written_total").increment(1);
                            }
                            Err(e) => match self.sink.policy() {
                                DeliveryPolicy::AtMostOnce => {
                                    dropped += 1;
                                    counter!("ingest_write_errors_total").increment(1);
                                    tracing::error!(source = %url, error = %e, "failed to write");
                                }
                            },
                        }
                    }
                    SourceOutcome::Ingested {
                        dialect,
                        events: events.len(),
                        written,
                        dropped,
                    }
                }
                Err(e) => {
                    tracing::error!(source = %url, error = %e, "skipping source this cycle");
                    SourceOutcome::Skipped(e)
                }
            };
            report.sources.push((url.clone(), outcome));
        }

        counter!("ingest_cycles_total").increment(1);
        gauge!("ingest_cycle_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            written = report.written(),
            dropped = report.dropped(),
            skipped = report.skipped(),
            "cycle finished"
        );
        report
    }

    /// Cycle, sleep the configured interval, repeat. Never returns.
    pub async fn run(&self) {
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.cfg.interval).await;
        }
    }
}
