//! Shared enumerations for timeline events, documents, and provenance.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════
// Event Kind
// ═══════════════════════════════════════════

/// The kinds of timeline events the gap pipeline inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Surgery,
    RadiationStart,
    RadiationEnd,
    Imaging,
    ChemotherapyStart,
    ChemotherapyEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Surgery => "surgery",
            Self::RadiationStart => "radiation_start",
            Self::RadiationEnd => "radiation_end",
            Self::Imaging => "imaging",
            Self::ChemotherapyStart => "chemotherapy_start",
            Self::ChemotherapyEnd => "chemotherapy_end",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "surgery" => Some(Self::Surgery),
            "radiation_start" => Some(Self::RadiationStart),
            "radiation_end" => Some(Self::RadiationEnd),
            "imaging" => Some(Self::Imaging),
            "chemotherapy_start" => Some(Self::ChemotherapyStart),
            "chemotherapy_end" => Some(Self::ChemotherapyEnd),
            _ => None,
        }
    }

    pub fn all() -> &'static [EventKind] {
        &[
            Self::Surgery,
            Self::RadiationStart,
            Self::RadiationEnd,
            Self::Imaging,
            Self::ChemotherapyStart,
            Self::ChemotherapyEnd,
        ]
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Document Category
// ═══════════════════════════════════════════

/// Clinical document categories the discovery engine searches over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    OperativeRecord,
    DischargeSummary,
    ProgressNote,
    ImagingReport,
    RadiationDocument,
    HistoryAndPhysical,
    PathologyReport,
    Other,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperativeRecord => "operative_record",
            Self::DischargeSummary => "discharge_summary",
            Self::ProgressNote => "progress_note",
            Self::ImagingReport => "imaging_report",
            Self::RadiationDocument => "radiation_document",
            Self::HistoryAndPhysical => "history_and_physical",
            Self::PathologyReport => "pathology_report",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "operative_record" => Some(Self::OperativeRecord),
            "discharge_summary" => Some(Self::DischargeSummary),
            "progress_note" => Some(Self::ProgressNote),
            "imaging_report" => Some(Self::ImagingReport),
            "radiation_document" => Some(Self::RadiationDocument),
            "history_and_physical" => Some(Self::HistoryAndPhysical),
            "pathology_report" => Some(Self::PathologyReport),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Gap Priority & Status
// ═══════════════════════════════════════════

/// Clinical criticality of a gap. Ordering: `Highest` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPriority {
    Highest,
    High,
    Medium,
    Low,
}

impl GapPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Highest => "highest",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for GapPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a gap. Transitions are enforced by `Gap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    Open,
    Resolved,
    Unresolved,
}

impl GapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for GapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Source Authority & Agreement
// ═══════════════════════════════════════════

/// Authority category of a source record. Ranking drives adjudication:
/// a primary procedural record outranks a secondary narrative, which
/// outranks an objective but indirect assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAuthority {
    PrimaryProcedural,
    SecondaryNarrative,
    ObjectiveImaging,
}

impl SourceAuthority {
    /// 0 = most authoritative.
    pub fn rank(&self) -> u8 {
        match self {
            Self::PrimaryProcedural => 0,
            Self::SecondaryNarrative => 1,
            Self::ObjectiveImaging => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryProcedural => "primary_procedural",
            Self::SecondaryNarrative => "secondary_narrative",
            Self::ObjectiveImaging => "objective_imaging",
        }
    }
}

impl std::fmt::Display for SourceAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How independently obtained values for the same field relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    SingleSource,
    FullAgreement,
    PartialAgreement,
    Discrepancy,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleSource => "single_source",
            Self::FullAgreement => "full_agreement",
            Self::PartialAgreement => "partial_agreement",
            Self::Discrepancy => "discrepancy",
        }
    }
}

impl std::fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Confidence Tier & Extraction Method
// ═══════════════════════════════════════════

/// The agent's self-reported confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Moderate,
    Low,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }

    /// Lenient parse of the tier the agent put into its payload.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "moderate" | "medium" => Some(Self::Moderate),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Numeric score used when a tier becomes a source-record confidence.
    pub fn score(&self) -> f32 {
        match self {
            Self::High => 0.9,
            Self::Moderate => 0.7,
            Self::Low => 0.4,
        }
    }

    pub fn is_lowest(&self) -> bool {
        matches!(self, Self::Low)
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a source record's value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    AgentExtraction,
    WarehouseRecord,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentExtraction => "agent_extraction",
            Self::WarehouseRecord => "warehouse_record",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
