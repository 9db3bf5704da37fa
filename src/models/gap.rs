//! Gaps: detected missing or unreliable required fields on timeline events.
//!
//! A gap's kind determines its required fields, priority, and discovery
//! parameters from static tables, so none of them can drift after creation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::document::{DiscoveryTier, DocumentRef};
use super::enums::{DocumentCategory, EventKind, GapPriority, GapStatus};

// ═══════════════════════════════════════════
// Gap Kind & Field Specs
// ═══════════════════════════════════════════

/// The missing-field classes the pipeline knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    ResectionExtent,
    RadiationCourse,
    ImagingConclusion,
    ChemotherapyRegimen,
}

/// Expected value shape of a required field; drives validation and
/// typed merge back into the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    /// One of a fixed category set (e.g. resection extent).
    Category,
    /// A number within a plausible interval (e.g. total dose in Gy).
    Numeric,
    /// An ISO date.
    Date,
    /// Free text with a minimum useful length.
    Narrative,
    /// A non-empty list of short strings (e.g. chemotherapy agents).
    List,
}

/// A required field for a gap kind, with accepted name synonyms.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub alternates: &'static [&'static str],
    pub shape: FieldShape,
}

impl FieldSpec {
    /// Does `name` refer to this field, directly or via a synonym?
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.alternates.contains(&name)
    }
}

const RESECTION_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "resection_extent",
    alternates: &["extent_of_resection", "eor"],
    shape: FieldShape::Category,
}];

const RADIATION_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "stop_date",
        alternates: &["end_date", "completion_date"],
        shape: FieldShape::Date,
    },
    FieldSpec {
        name: "total_dose_gy",
        alternates: &["total_dose", "dose_gy"],
        shape: FieldShape::Numeric,
    },
];

const IMAGING_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "conclusion",
    alternates: &["impression", "findings_summary"],
    shape: FieldShape::Narrative,
}];

const CHEMO_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "agents",
    alternates: &["regimen", "drugs"],
    shape: FieldShape::List,
}];

impl GapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResectionExtent => "resection_extent",
            Self::RadiationCourse => "radiation_course",
            Self::ImagingConclusion => "imaging_conclusion",
            Self::ChemotherapyRegimen => "chemotherapy_regimen",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "resection_extent" => Some(Self::ResectionExtent),
            "radiation_course" => Some(Self::RadiationCourse),
            "imaging_conclusion" => Some(Self::ImagingConclusion),
            "chemotherapy_regimen" => Some(Self::ChemotherapyRegimen),
            _ => None,
        }
    }

    pub fn all() -> &'static [GapKind] {
        &[
            Self::ResectionExtent,
            Self::RadiationCourse,
            Self::ImagingConclusion,
            Self::ChemotherapyRegimen,
        ]
    }

    /// Which gap kind guards an event kind's required fields, if any.
    pub fn for_event(kind: EventKind) -> Option<GapKind> {
        match kind {
            EventKind::Surgery => Some(Self::ResectionExtent),
            EventKind::RadiationStart => Some(Self::RadiationCourse),
            EventKind::Imaging => Some(Self::ImagingConclusion),
            EventKind::ChemotherapyStart => Some(Self::ChemotherapyRegimen),
            EventKind::RadiationEnd | EventKind::ChemotherapyEnd => None,
        }
    }

    /// Fixed at creation; never changes for a given kind.
    pub fn required_fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::ResectionExtent => RESECTION_FIELDS,
            Self::RadiationCourse => RADIATION_FIELDS,
            Self::ImagingConclusion => IMAGING_FIELDS,
            Self::ChemotherapyRegimen => CHEMO_FIELDS,
        }
    }

    /// Resection extent and radiation dose are the most clinically critical;
    /// narrative-conclusion quality matters less.
    pub fn priority(&self) -> GapPriority {
        match self {
            Self::ResectionExtent | Self::RadiationCourse => GapPriority::Highest,
            Self::ChemotherapyRegimen => GapPriority::High,
            Self::ImagingConclusion => GapPriority::Medium,
        }
    }

    /// The document category most likely to state the missing fact.
    pub fn primary_category(&self) -> DocumentCategory {
        match self {
            Self::ResectionExtent => DocumentCategory::OperativeRecord,
            Self::RadiationCourse => DocumentCategory::RadiationDocument,
            Self::ImagingConclusion => DocumentCategory::ImagingReport,
            Self::ChemotherapyRegimen => DocumentCategory::ProgressNote,
        }
    }

    /// Fallback categories for tier 5, ordered by how likely each is to
    /// restate the needed fact.
    pub fn alternate_categories(&self) -> &'static [DocumentCategory] {
        match self {
            Self::ResectionExtent => &[
                DocumentCategory::ProgressNote,
                DocumentCategory::DischargeSummary,
                DocumentCategory::ImagingReport,
            ],
            Self::RadiationCourse => &[
                DocumentCategory::ProgressNote,
                DocumentCategory::DischargeSummary,
            ],
            Self::ImagingConclusion => &[DocumentCategory::ProgressNote],
            Self::ChemotherapyRegimen => &[
                DocumentCategory::DischargeSummary,
                DocumentCategory::HistoryAndPhysical,
            ],
        }
    }

    /// Day window for tier 3 (category near event date).
    pub fn narrow_window_days(&self) -> i64 {
        match self {
            Self::ResectionExtent => 7,
            Self::RadiationCourse => 14,
            Self::ImagingConclusion => 3,
            Self::ChemotherapyRegimen => 7,
        }
    }

    /// Day window for tier 4 (encounter-date match, linkage relaxed).
    pub fn relaxed_window_days(&self) -> i64 {
        match self {
            Self::ResectionExtent => 14,
            Self::RadiationCourse => 30,
            Self::ImagingConclusion => 7,
            Self::ChemotherapyRegimen => 14,
        }
    }

    /// Day window for tier 5 (alternate categories, widened).
    pub fn alternate_window_days(&self) -> i64 {
        match self {
            Self::ResectionExtent => 21,
            Self::RadiationCourse => 45,
            Self::ImagingConclusion => 14,
            Self::ChemotherapyRegimen => 21,
        }
    }

    /// Logical source name for completeness accounting.
    pub fn completeness_source(&self) -> &'static str {
        match self {
            Self::ResectionExtent => "surgery records",
            Self::RadiationCourse => "radiation documents",
            Self::ImagingConclusion => "imaging reports",
            Self::ChemotherapyRegimen => "chemotherapy records",
        }
    }
}

impl std::fmt::Display for GapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Gap
// ═══════════════════════════════════════════

/// Short summary attached to a gap when it resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub document_ref: Option<DocumentRef>,
    pub tier: Option<DiscoveryTier>,
    /// Canonical names of the fields that were filled.
    pub fields: Vec<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GapStateError {
    #[error("gap {0} is already resolved")]
    AlreadyResolved(Uuid),
}

/// A detected missing/invalid required field set on one timeline event.
///
/// Status only moves Open → Resolved or Open → Unresolved; an unresolved
/// gap may later resolve through a remediation pass, but a resolved gap
/// is never reopened.
#[derive(Debug, Clone, Serialize)]
pub struct Gap {
    pub id: Uuid,
    pub kind: GapKind,
    pub event_id: String,
    pub priority: GapPriority,
    status: GapStatus,
    resolution: Option<ResolutionSummary>,
    unresolved_reason: Option<String>,
}

impl Gap {
    /// The id is a UUIDv5 over (event id, gap kind), so re-identifying the
    /// same timeline yields byte-identical gaps.
    pub fn new(kind: GapKind, event_id: impl Into<String>) -> Self {
        let event_id = event_id.into();
        let id = Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("{event_id}/{}", kind.as_str()).as_bytes(),
        );
        Self {
            id,
            kind,
            event_id,
            priority: kind.priority(),
            status: GapStatus::Open,
            resolution: None,
            unresolved_reason: None,
        }
    }

    pub fn status(&self) -> GapStatus {
        self.status
    }

    pub fn required_fields(&self) -> &'static [FieldSpec] {
        self.kind.required_fields()
    }

    pub fn resolution(&self) -> Option<&ResolutionSummary> {
        self.resolution.as_ref()
    }

    pub fn unresolved_reason(&self) -> Option<&str> {
        self.unresolved_reason.as_deref()
    }

    /// Open → Resolved, or Unresolved → Resolved (later remediation pass).
    pub fn mark_resolved(&mut self, summary: ResolutionSummary) -> Result<(), GapStateError> {
        if self.status == GapStatus::Resolved {
            return Err(GapStateError::AlreadyResolved(self.id));
        }
        self.status = GapStatus::Resolved;
        self.resolution = Some(summary);
        self.unresolved_reason = None;
        Ok(())
    }

    /// Open → Unresolved. A resolved gap is never reopened.
    pub fn mark_unresolved(&mut self, reason: impl Into<String>) -> Result<(), GapStateError> {
        if self.status == GapStatus::Resolved {
            return Err(GapStateError::AlreadyResolved(self.id));
        }
        self.status = GapStatus::Unresolved;
        self.unresolved_reason = Some(reason.into());
        Ok(())
    }
}
