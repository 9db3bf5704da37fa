//! Document references, warehouse metadata, and discovery candidates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::DocumentCategory;

/// Opaque reference to a source document in the clinical warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ═══════════════════════════════════════════
// Discovery Tier
// ═══════════════════════════════════════════

/// Fallback tiers of the document discovery engine, in evaluation order.
/// Lower ordinal = higher-priority linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryTier {
    /// The event carries an explicit reference to its source document.
    DirectLink,
    /// Documents linked to the event's owning encounter.
    EncounterLink,
    /// Expected category within a narrow day window of the event date.
    TemporalNarrow,
    /// Expected category matched by encounter date (linkage itself may be wrong).
    TemporalRelaxed,
    /// Adjacent categories within a widened window.
    AlternateCategory,
    /// Primitive document index scan, bypassing derived linkage views.
    RawScan,
}

impl DiscoveryTier {
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::DirectLink => 1,
            Self::EncounterLink => 2,
            Self::TemporalNarrow => 3,
            Self::TemporalRelaxed => 4,
            Self::AlternateCategory => 5,
            Self::RawScan => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectLink => "direct_link",
            Self::EncounterLink => "encounter_link",
            Self::TemporalNarrow => "temporal_narrow",
            Self::TemporalRelaxed => "temporal_relaxed",
            Self::AlternateCategory => "alternate_category",
            Self::RawScan => "raw_scan",
        }
    }

    pub fn all() -> &'static [DiscoveryTier] {
        &[
            Self::DirectLink,
            Self::EncounterLink,
            Self::TemporalNarrow,
            Self::TemporalRelaxed,
            Self::AlternateCategory,
            Self::RawScan,
        ]
    }
}

impl std::fmt::Display for DiscoveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Document Metadata
// ═══════════════════════════════════════════

/// Warehouse metadata for one document, as returned by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub document_ref: DocumentRef,
    /// Raw declared type string from the warehouse ("OP NOTE", "DC SUMM", ...).
    pub declared_type: Option<String>,
    /// Normalized category, when the warehouse mapping produced one.
    pub category: Option<DocumentCategory>,
    pub document_date: Option<NaiveDate>,
    pub encounter_id: Option<String>,
    /// Date of the owning encounter; may differ from the document date.
    pub encounter_date: Option<NaiveDate>,
    pub content_type: String,
}

impl DocumentMeta {
    pub fn new(document_ref: impl Into<String>) -> Self {
        Self {
            document_ref: DocumentRef::new(document_ref),
            declared_type: None,
            category: None,
            document_date: None,
            encounter_id: None,
            encounter_date: None,
            content_type: "text/plain".to_string(),
        }
    }

    pub fn with_declared_type(mut self, t: &str) -> Self {
        self.declared_type = Some(t.to_string());
        self
    }

    pub fn with_category(mut self, category: DocumentCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.document_date = Some(date);
        self
    }

    pub fn with_encounter(mut self, encounter_id: &str) -> Self {
        self.encounter_id = Some(encounter_id.to_string());
        self
    }

    pub fn with_encounter_date(mut self, date: NaiveDate) -> Self {
        self.encounter_date = Some(date);
        self
    }
}

// ═══════════════════════════════════════════
// Candidate Document
// ═══════════════════════════════════════════

/// A document hypothesized to contain the value needed to fill a gap,
/// as produced (and ranked) by the discovery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDocument {
    pub document_ref: DocumentRef,
    pub category: Option<DocumentCategory>,
    pub declared_type: Option<String>,
    /// Which fallback tier surfaced this candidate.
    pub tier: DiscoveryTier,
    /// Days between document date and event date; `None` when undated.
    pub temporal_distance_days: Option<i64>,
    /// Within-tier category specificity; 0 = the gap's primary category.
    pub category_rank: u8,
    pub content_type: String,
}

impl CandidateDocument {
    pub fn from_meta(
        meta: &DocumentMeta,
        tier: DiscoveryTier,
        event_date: NaiveDate,
        category_rank: u8,
    ) -> Self {
        let temporal_distance_days = meta
            .document_date
            .map(|d| (d - event_date).num_days().abs());
        Self {
            document_ref: meta.document_ref.clone(),
            category: meta.category,
            declared_type: meta.declared_type.clone(),
            tier,
            temporal_distance_days,
            category_rank,
            content_type: meta.content_type.clone(),
        }
    }

    /// Sort key within a tier: specific categories first, then closest in time,
    /// then stable by reference so ordering is deterministic.
    pub fn within_tier_key(&self) -> (u8, i64, String) {
        (
            self.category_rank,
            self.temporal_distance_days.unwrap_or(i64::MAX),
            self.document_ref.0.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn tier_ordinals_follow_evaluation_order() {
        let ordinals: Vec<u8> = DiscoveryTier::all().iter().map(|t| t.ordinal()).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn tier_ordering_matches_ordinals() {
        assert!(DiscoveryTier::DirectLink < DiscoveryTier::RawScan);
        assert!(DiscoveryTier::TemporalNarrow < DiscoveryTier::AlternateCategory);
    }

    #[test]
    fn candidate_temporal_distance_from_meta() {
        let meta = DocumentMeta::new("doc-1")
            .with_category(DocumentCategory::OperativeRecord)
            .with_date(day(10));
        let candidate =
            CandidateDocument::from_meta(&meta, DiscoveryTier::TemporalNarrow, day(7), 0);
        assert_eq!(candidate.temporal_distance_days, Some(3));
    }

    #[test]
    fn undated_candidate_sorts_last_within_tier() {
        let dated = CandidateDocument::from_meta(
            &DocumentMeta::new("doc-a").with_date(day(9)),
            DiscoveryTier::RawScan,
            day(7),
            0,
        );
        let undated =
            CandidateDocument::from_meta(&DocumentMeta::new("doc-b"), DiscoveryTier::RawScan, day(7), 0);
        assert!(dated.within_tier_key() < undated.within_tier_key());
    }

    #[test]
    fn document_ref_display() {
        let r = DocumentRef::new("note-42");
        assert_eq!(r.to_string(), "note-42");
        assert_eq!(r.as_str(), "note-42");
    }
}
