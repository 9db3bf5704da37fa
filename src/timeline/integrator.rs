//! Timeline integrator — merges adjudicated values into their owning events.
//!
//! Merges are keyed by (event id, gap kind), not by append: repeating a merge
//! with the same resolution leaves the event exactly as after the first merge.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::gap::FieldShape;
use crate::models::{AdjudicatedField, FieldValue, Gap, GapKind};
use crate::timeline::Timeline;

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("event {0} not found on the timeline")]
    UnknownEvent(String),

    #[error("value '{value}' for field '{field}' is not a valid {expected}")]
    ValueShape {
        field: String,
        value: String,
        expected: &'static str,
    },
}

/// Outcome of one merge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// The same (event, gap kind) resolution was merged before; no-op.
    AlreadyApplied,
}

/// The only writer of event fields after timeline construction.
#[derive(Debug, Default)]
pub struct TimelineIntegrator {
    applied: BTreeSet<(String, GapKind)>,
}

impl TimelineIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a gap's adjudicated fields into its owning event.
    ///
    /// Values are coerced to the shape the gap kind declares for the field;
    /// unknown field names are stored as text.
    pub fn merge(
        &mut self,
        timeline: &mut Timeline,
        gap: &Gap,
        fields: &[AdjudicatedField],
    ) -> Result<MergeOutcome, IntegrationError> {
        let key = (gap.event_id.clone(), gap.kind);
        if self.applied.contains(&key) {
            tracing::debug!(
                event_id = %gap.event_id,
                gap_kind = %gap.kind,
                "Resolution already merged, skipping"
            );
            return Ok(MergeOutcome::AlreadyApplied);
        }

        let event = timeline
            .event_mut(&gap.event_id)
            .ok_or_else(|| IntegrationError::UnknownEvent(gap.event_id.clone()))?;

        // Coerce every value before applying any, so a bad value cannot
        // leave the event partially merged.
        let mut coerced = Vec::with_capacity(fields.len());
        for field in fields {
            coerced.push((
                field.field_name.as_str(),
                coerce(gap.kind, &field.field_name, &field.final_value)?,
            ));
        }
        for (name, value) in coerced {
            event.set_field(name, value);
        }

        tracing::info!(
            event_id = %gap.event_id,
            gap_kind = %gap.kind,
            field_count = fields.len(),
            "Merged adjudicated fields into event"
        );
        self.applied.insert(key);
        Ok(MergeOutcome::Applied)
    }
}

static FLOAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

/// Coerce an adjudicated string value to the field's declared shape.
fn coerce(kind: GapKind, field_name: &str, raw: &str) -> Result<FieldValue, IntegrationError> {
    let shape = kind
        .required_fields()
        .iter()
        .find(|spec| spec.matches(field_name))
        .map(|spec| spec.shape);

    match shape {
        Some(FieldShape::Numeric) => FLOAT_RE
            .find(raw)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(FieldValue::Number)
            .ok_or_else(|| IntegrationError::ValueShape {
                field: field_name.to_string(),
                value: raw.to_string(),
                expected: "number",
            }),
        Some(FieldShape::Date) => chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(FieldValue::Date)
            .map_err(|_| IntegrationError::ValueShape {
                field: field_name.to_string(),
                value: raw.to_string(),
                expected: "ISO date",
            }),
        _ => Ok(FieldValue::text(raw.trim())),
    }
}
