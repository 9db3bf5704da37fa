//! Gap identifier — scans timeline events for missing or unreliable
//! required fields. Rule-based only, no agent calls, idempotent: the same
//! timeline always yields the same gap set in the same order.

use crate::models::gap::FieldShape;
use crate::models::{EventKind, Gap, GapKind, TimelineEvent};
use crate::timeline::Timeline;

/// A paired radiation_end event within this many days after the start
/// satisfies the stop-date requirement without extraction.
const RADIATION_COURSE_MAX_DAYS: i64 = 120;

pub struct GapIdentifier {
    min_conclusion_chars: usize,
}

impl GapIdentifier {
    pub fn new(min_conclusion_chars: usize) -> Self {
        Self { min_conclusion_chars }
    }

    /// Scan the timeline and emit one gap per event whose required fields
    /// are absent, empty, or too vague. Output is ordered by priority, then
    /// event date, then event id.
    pub fn identify(&self, timeline: &Timeline) -> Vec<Gap> {
        let mut found: Vec<(Gap, chrono::NaiveDate)> = Vec::new();

        for event in timeline.events() {
            let Some(kind) = GapKind::for_event(event.kind) else {
                continue;
            };
            let missing = self.missing_fields(kind, event, timeline);
            if missing.is_empty() {
                continue;
            }
            tracing::debug!(
                event_id = %event.id,
                gap_kind = %kind,
                missing = ?missing,
                "Gap identified"
            );
            found.push((Gap::new(kind, &event.id), event.date));
        }

        found.sort_by(|(a, a_date), (b, b_date)| {
            a.priority
                .cmp(&b.priority)
                .then(a_date.cmp(b_date))
                .then(a.event_id.cmp(&b.event_id))
        });
        found.into_iter().map(|(gap, _)| gap).collect()
    }

    /// Which of the gap kind's required fields this event is missing.
    pub fn missing_fields(
        &self,
        kind: GapKind,
        event: &TimelineEvent,
        timeline: &Timeline,
    ) -> Vec<&'static str> {
        let mut missing = Vec::new();

        for spec in kind.required_fields() {
            let value = std::iter::once(spec.name)
                .chain(spec.alternates.iter().copied())
                .find_map(|name| event.field(name).filter(|v| !v.is_empty()));

            let satisfied = match value {
                Some(value) => match spec.shape {
                    // A present-but-short narrative is vague and re-extracted.
                    FieldShape::Narrative => value
                        .as_text()
                        .map(|t| t.trim().len() >= self.min_conclusion_chars)
                        .unwrap_or(true),
                    _ => true,
                },
                None => {
                    // Radiation stop dates can come from a paired end event.
                    spec.name == "stop_date"
                        && kind == GapKind::RadiationCourse
                        && has_matching_radiation_end(event, timeline)
                }
            };

            if !satisfied {
                missing.push(spec.name);
            }
        }

        missing
    }
}

impl Default for GapIdentifier {
    fn default() -> Self {
        Self::new(40)
    }
}

/// A radiation_end event with the same encounter, or dated within the
/// course window after the start, answers the stop date from the warehouse.
fn has_matching_radiation_end(start: &TimelineEvent, timeline: &Timeline) -> bool {
    timeline.events().any(|other| {
        if other.kind != EventKind::RadiationEnd {
            return false;
        }
        match (&start.encounter_id, &other.encounter_id) {
            (Some(a), Some(b)) if a == b => true,
            _ => {
                let days = (other.date - start.date).num_days();
                (0..=RADIATION_COURSE_MAX_DAYS).contains(&days)
            }
        }
    })
}
