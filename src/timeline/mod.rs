//! The clinical timeline — chronological event map of the patient's history.
//!
//! The timeline is read-only for the whole pipeline except the integrator,
//! which merges adjudicated field values back into their owning events.

pub mod integrator;

pub use integrator::{IntegrationError, MergeOutcome, TimelineIntegrator};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::TimelineEvent;

/// The event map. Keyed by event id; iteration order is deterministic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    events: BTreeMap<String, TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<TimelineEvent>) -> Self {
        let mut timeline = Self::new();
        for event in events {
            timeline.insert(event);
        }
        timeline
    }

    /// Construction-time insertion; replaces any event with the same id.
    pub fn insert(&mut self, event: TimelineEvent) {
        self.events.insert(event.id.clone(), event);
    }

    pub fn event(&self, id: &str) -> Option<&TimelineEvent> {
        self.events.get(id)
    }

    pub(crate) fn event_mut(&mut self, id: &str) -> Option<&mut TimelineEvent> {
        self.events.get_mut(id)
    }

    pub fn events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.values()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventKind, FieldValue};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn from_events_keys_by_id() {
        let timeline = Timeline::from_events(vec![
            TimelineEvent::new("ev-2", EventKind::Imaging, day(9)),
            TimelineEvent::new("ev-1", EventKind::Surgery, day(7)),
        ]);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.event("ev-1").unwrap().kind, EventKind::Surgery);
        assert!(timeline.event("ev-3").is_none());
    }

    #[test]
    fn insert_replaces_same_id() {
        let mut timeline = Timeline::new();
        timeline.insert(TimelineEvent::new("ev-1", EventKind::Surgery, day(7)));
        timeline.insert(
            TimelineEvent::new("ev-1", EventKind::Surgery, day(7))
                .with_field("resection_extent", FieldValue::text("GTR")),
        );
        assert_eq!(timeline.len(), 1);
        assert!(timeline.event("ev-1").unwrap().has_field("resection_extent"));
    }

    #[test]
    fn iteration_is_deterministic() {
        let timeline = Timeline::from_events(vec![
            TimelineEvent::new("b", EventKind::Imaging, day(9)),
            TimelineEvent::new("a", EventKind::Surgery, day(7)),
        ]);
        let ids: Vec<&str> = timeline.events().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
