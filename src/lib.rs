// src/lib.rs
//! Feed collector: polls Atom and RSS sources, normalizes every entry into a
//! canonical event and stores it as one InfluxDB point per entry.
//!
//! ```text
//! Scheduler → Fetcher → detect::decode → normalize → Sink → TimeSeriesStore
//! ```

pub mod config;
pub mod ingest;
pub mod sink;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::ingest::detect::{decode, DetectionError};
pub use crate::ingest::scheduler::{CycleReport, Scheduler, SchedulerCfg, SourceOutcome};
pub use crate::ingest::types::{CanonicalEvent, Dialect, Feed};
pub use crate::sink::{MemoryStore, Point, Sink, TimeSeriesStore, WriteError};
