//! Timeline events and their typed field map.
//!
//! Events are created during timeline construction and mutated only by the
//! timeline integrator: field writes after construction go through the
//! crate-private `set_field`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::document::DocumentRef;
use super::enums::EventKind;

/// A typed field value on a timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// A whitespace-only text value counts as absent.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{d}"),
        }
    }
}

/// A single entry on the clinical timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    pub kind: EventKind,
    pub date: NaiveDate,
    pub encounter_id: Option<String>,
    /// Explicit link to the document this event was derived from, when known.
    pub source_document: Option<DocumentRef>,
    fields: BTreeMap<String, FieldValue>,
}

impl TimelineEvent {
    pub fn new(id: impl Into<String>, kind: EventKind, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            kind,
            date,
            encounter_id: None,
            source_document: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_encounter(mut self, encounter_id: &str) -> Self {
        self.encounter_id = Some(encounter_id.to_string());
        self
    }

    pub fn with_source_document(mut self, document: impl Into<String>) -> Self {
        self.source_document = Some(DocumentRef::new(document));
        self
    }

    /// Construction-time field initialization.
    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_text())
    }

    /// Present and non-empty.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.get(name).map(|v| !v.is_empty()).unwrap_or(false)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Post-construction mutation, reserved for the timeline integrator.
    pub(crate) fn set_field(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }
}
