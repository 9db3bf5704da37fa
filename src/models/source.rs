//! Provenance-tagged source records and adjudicated field values.

use serde::{Deserialize, Serialize};

use super::document::DocumentRef;
use super::enums::{AgreementStatus, ExtractionMethod, SourceAuthority};

/// One provenance-tagged contribution to a field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub authority: SourceAuthority,
    pub value: String,
    pub confidence: f32,
    pub method: ExtractionMethod,
    pub document_ref: Option<DocumentRef>,
    /// Verbatim excerpt the value was read from, when available.
    pub excerpt: Option<String>,
}

impl SourceRecord {
    pub fn new(authority: SourceAuthority, value: impl Into<String>, confidence: f32) -> Self {
        Self {
            authority,
            value: value.into(),
            confidence,
            method: ExtractionMethod::AgentExtraction,
            document_ref: None,
            excerpt: None,
        }
    }

    pub fn with_method(mut self, method: ExtractionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_document(mut self, document: DocumentRef) -> Self {
        self.document_ref = Some(document);
        self
    }

    pub fn with_excerpt(mut self, excerpt: &str) -> Self {
        self.excerpt = Some(excerpt.to_string());
        self
    }
}

/// The reconciled value for one field, with its full evidence trail.
///
/// Only the adjudicator constructs these, and it refuses an empty source
/// list — an adjudicated value never materializes from zero evidence.
#[derive(Debug, Clone, Serialize)]
pub struct AdjudicatedField {
    pub field_name: String,
    sources: Vec<SourceRecord>,
    pub agreement: AgreementStatus,
    pub final_value: String,
    pub final_confidence: f32,
    /// Which sources were compared and why the final value was chosen.
    pub rationale: String,
    /// Optional agent explanation of a severe discrepancy; stored for audit,
    /// never authoritative.
    pub advisory_note: Option<String>,
}

impl AdjudicatedField {
    /// Crate-private: `adjudicate` is the only producer, and it has already
    /// verified `sources` is non-empty.
    pub(crate) fn new(
        field_name: String,
        sources: Vec<SourceRecord>,
        agreement: AgreementStatus,
        final_value: String,
        final_confidence: f32,
        rationale: String,
    ) -> Self {
        debug_assert!(!sources.is_empty(), "adjudicated field without evidence");
        Self {
            field_name,
            sources,
            agreement,
            final_value,
            final_confidence,
            rationale,
            advisory_note: None,
        }
    }

    pub fn sources(&self) -> &[SourceRecord] {
        &self.sources
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub(crate) fn set_advisory(&mut self, note: String) {
        self.advisory_note = Some(note);
    }
}
