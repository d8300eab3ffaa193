// src/sink/memory.rs
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Point, TimeSeriesStore, WriteError};

type PointKey = (String, Vec<(String, String)>, i64);

/// In-process store with the same identity rules as the real one:
/// (measurement, non-empty tags, second-precision time), last write wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    points: Mutex<BTreeMap<PointKey, Point>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points currently retained, in key order.
    pub fn points(&self) -> Vec<Point> {
        let map = self.points.lock().unwrap_or_else(|e| e.into_inner());
        map.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of points submitted, including ones that replaced others.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn key(p: &Point) -> PointKey {
    (
        p.measurement.clone(),
        p.stored_tags()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        p.time.timestamp(),
    )
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn ensure_database(&self, _name: &str) -> Result<(), WriteError> {
        Ok(())
    }

    async fn write_batch(&self, points: &[Point]) -> Result<(), WriteError> {
        let mut map = self.points.lock().unwrap_or_else(|e| e.into_inner());
        for p in points {
            map.insert(key(p), p.clone());
        }
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += points.len();
        Ok(())
    }
}
