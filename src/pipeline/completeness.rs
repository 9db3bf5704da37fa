//! Completeness tracker — per-source attempt/success/failure accounting.
//!
//! Updated from every step of the pipeline and never fails: a poisoned lock
//! is recovered, a missing source simply starts a fresh counter row.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Monotonic counters for one logical data source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub record_count: u64,
}

impl SourceCounters {
    pub fn success_ratio(&self) -> f32 {
        if self.attempted == 0 {
            return 1.0;
        }
        self.succeeded as f32 / self.attempted as f32
    }
}

/// Process-wide counter map keyed by logical source name
/// (e.g. "surgery records", "radiation documents").
#[derive(Debug, Default)]
pub struct CompletenessTracker {
    inner: Mutex<BTreeMap<String, SourceCounters>>,
}

impl CompletenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry(&self, source: &str, update: impl FnOnce(&mut SourceCounters)) {
        let mut map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(map.entry(source.to_string()).or_default());
    }

    pub fn record_attempt(&self, source: &str) {
        self.with_entry(source, |c| c.attempted += 1);
    }

    pub fn record_success(&self, source: &str) {
        self.with_entry(source, |c| c.succeeded += 1);
    }

    pub fn record_failure(&self, source: &str) {
        self.with_entry(source, |c| c.failed += 1);
    }

    pub fn add_records(&self, source: &str, count: u64) {
        self.with_entry(source, |c| c.record_count += count);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> BTreeMap<String, SourceCounters> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Overall succeeded/attempted ratio across all sources; 1.0 when
    /// nothing was attempted.
    pub fn overall_ratio(&self) -> f32 {
        let snapshot = self.snapshot();
        let attempted: u64 = snapshot.values().map(|c| c.attempted).sum();
        if attempted == 0 {
            return 1.0;
        }
        let succeeded: u64 = snapshot.values().map(|c| c.succeeded).sum();
        succeeded as f32 / attempted as f32
    }
}
