// src/sink/mod.rs
//! Time-series sink.
//!
//! One canonical event becomes exactly one [`Point`]. Point identity in the
//! store is (measurement, tag set, time); writing the same identity twice
//! replaces the stored point, which is the only deduplication the pipeline
//! relies on.

pub mod influx;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ingest::types::CanonicalEvent;

pub use influx::{InfluxConfig, InfluxHttpStore};
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("store rejected query: {0}")]
    Query(String),
    #[error("invalid store address: {0}")]
    Address(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub measurement: String,
    /// Sorted by key; the store wants them that way on the wire.
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub time: DateTime<Utc>,
}

/// Where the (possibly large) entry body goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TextPlacement {
    /// `text` is a tag and therefore part of point identity.
    #[default]
    Tag,
    /// `text` is a string field: not indexed, not part of identity.
    Field,
}

/// What happens to a point whose write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// One attempt per point. A failed write is logged, counted and dropped;
    /// there is no retry and no backoff.
    #[default]
    AtMostOnce,
}

impl Point {
    pub fn from_event(event: &CanonicalEvent, placement: TextPlacement) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("title".to_string(), event.title.clone());
        tags.insert("url".to_string(), event.url.clone());
        tags.insert("id".to_string(), event.id.clone());

        let mut fields = BTreeMap::new();
        fields.insert(
            "timestamp".to_string(),
            FieldValue::Integer(event.timestamp.timestamp()),
        );

        match placement {
            TextPlacement::Tag => {
                tags.insert("text".to_string(), event.text.clone());
            }
            TextPlacement::Field => {
                fields.insert("text".to_string(), FieldValue::Text(event.text.clone()));
            }
        }

        Self {
            measurement: event.measurement.clone(),
            tags,
            fields,
            time: event.timestamp,
        }
    }

    /// Tags the store actually keeps: empty values are dropped on write.
    pub fn stored_tags(&self) -> impl Iterator<Item = (&String, &String)> {
        self.tags.iter().filter(|(_, v)| !v.is_empty())
    }
}

/// Narrow time-series contract the pipeline depends on.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn ensure_database(&self, name: &str) -> Result<(), WriteError>;
    async fn write_batch(&self, points: &[Point]) -> Result<(), WriteError>;
}

/// Turns canonical events into single-point batch writes.
#[derive(Clone)]
pub struct Sink {
    store: Arc<dyn TimeSeriesStore>,
    placement: TextPlacement,
    policy: DeliveryPolicy,
}

impl Sink {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            store,
            placement: TextPlacement::default(),
            policy: DeliveryPolicy::default(),
        }
    }

    pub fn with_text_placement(mut self, placement: TextPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    pub async fn write(&self, event: &CanonicalEvent) -> Result<(), WriteError> {
        let point = Point::from_event(event, self.placement);
        tracing::debug!(measurement = %point.measurement, time = %point.time, "writing point");
        self.store.write_batch(std::slice::from_ref(&point)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> CanonicalEvent {
        CanonicalEvent {
            title: "A &amp; B".into(),
            text: "line1<br>line2".into(),
            url: String::new(),
            id: "1".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            measurement: "https://feeds.test/atom.xml".into(),
        }
    }

    #[test]
    fn point_carries_all_four_tags() {
        let p = Point::from_event(&event(), TextPlacement::Tag);
        let keys: Vec<_> = p.tags.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "text", "title", "url"]);
        assert_eq!(p.tags["url"], "");
        assert_eq!(
            p.fields["timestamp"],
            FieldValue::Integer(1_704_067_200)
        );
        assert_eq!(p.time.timestamp(), 1_704_067_200);
        assert_eq!(p.measurement, "https://feeds.test/atom.xml");
    }

    #[test]
    fn text_can_move_to_fields() {
        let p = Point::from_event(&event(), TextPlacement::Field);
        assert!(!p.tags.contains_key("text"));
        assert_eq!(
            p.fields["text"],
            FieldValue::Text("line1<br>line2".into())
        );
    }

    #[test]
    fn empty_tags_are_not_stored() {
        let p = Point::from_event(&event(), TextPlacement::Tag);
        assert!(p.stored_tags().all(|(k, _)| k != "url"));
    }
}
