//! Core types for the gap-resolution pipeline.
//!
//! Extraction results are tagged per-gap-kind records with an explicit field
//! set plus a residual extra-fields bag, so required-field validation is a
//! static check rather than a runtime dictionary probe.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AdjudicatedField, CandidateDocument, ConfidenceTier, DiscoveryTier, DocumentRef, GapKind,
    GapStatus,
};

use super::completeness::SourceCounters;

// ═══════════════════════════════════════════
// Flexible deserializers
// ═══════════════════════════════════════════

/// Accept a number, a numeric string, or a string with a trailing unit
/// ("59.4 Gy") for numeric fields the agent sometimes renders as text.
fn de_flexible_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => leading_float(&s),
        _ => None,
    })
}

/// Accept a list of strings or a single comma/plus-separated string for
/// list fields ("temozolomide, lomustine").
fn de_flexible_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        serde_json::Value::String(s) => s
            .split([',', '+', ';'])
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

pub(crate) fn leading_float(s: &str) -> Option<f64> {
    use std::sync::LazyLock;
    static FLOAT_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));
    FLOAT_RE.find(s).and_then(|m| m.as_str().parse().ok())
}

// ═══════════════════════════════════════════
// Per-gap-kind parsed field records
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResectionFields {
    #[serde(default, alias = "extent_of_resection", alias = "eor")]
    pub resection_extent: Option<String>,
    #[serde(default)]
    pub evidence_quote: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadiationFields {
    #[serde(default, alias = "end_date", alias = "completion_date")]
    pub stop_date: Option<String>,
    #[serde(
        default,
        alias = "total_dose",
        alias = "dose_gy",
        deserialize_with = "de_flexible_number"
    )]
    pub total_dose_gy: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_number")]
    pub fractions: Option<f64>,
    #[serde(default)]
    pub evidence_quote: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagingFields {
    #[serde(default, alias = "impression", alias = "findings_summary")]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub evidence_quote: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChemotherapyFields {
    #[serde(
        default,
        alias = "regimen",
        alias = "drugs",
        deserialize_with = "de_flexible_list"
    )]
    pub agents: Vec<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub evidence_quote: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The agent's parsed field map for one gap kind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ParsedFields {
    Resection(ResectionFields),
    Radiation(RadiationFields),
    Imaging(ImagingFields),
    Chemotherapy(ChemotherapyFields),
}

impl ParsedFields {
    /// Parse the agent's JSON payload for the given gap kind.
    pub fn from_json(kind: GapKind, json: &serde_json::Value) -> Result<Self, serde_json::Error> {
        match kind {
            GapKind::ResectionExtent => {
                serde_json::from_value(json.clone()).map(Self::Resection)
            }
            GapKind::RadiationCourse => {
                serde_json::from_value(json.clone()).map(Self::Radiation)
            }
            GapKind::ImagingConclusion => {
                serde_json::from_value(json.clone()).map(Self::Imaging)
            }
            GapKind::ChemotherapyRegimen => {
                serde_json::from_value(json.clone()).map(Self::Chemotherapy)
            }
        }
    }

    /// The agent's self-reported confidence; absent or unrecognized tiers
    /// default to moderate.
    pub fn confidence_tier(&self) -> ConfidenceTier {
        let raw = match self {
            Self::Resection(f) => f.confidence.as_deref(),
            Self::Radiation(f) => f.confidence.as_deref(),
            Self::Imaging(f) => f.confidence.as_deref(),
            Self::Chemotherapy(f) => f.confidence.as_deref(),
        };
        raw.and_then(ConfidenceTier::parse)
            .unwrap_or(ConfidenceTier::Moderate)
    }

    pub fn evidence_quote(&self) -> Option<&str> {
        match self {
            Self::Resection(f) => f.evidence_quote.as_deref(),
            Self::Radiation(f) => f.evidence_quote.as_deref(),
            Self::Imaging(f) => f.evidence_quote.as_deref(),
            Self::Chemotherapy(f) => f.evidence_quote.as_deref(),
        }
    }

    /// Value of a canonical field name, rendered as a string. Empty values
    /// come back as `None`.
    pub fn value_of(&self, field: &str) -> Option<String> {
        let value = match (self, field) {
            (Self::Resection(f), "resection_extent") => f.resection_extent.clone(),
            (Self::Radiation(f), "stop_date") => f.stop_date.clone(),
            (Self::Radiation(f), "total_dose_gy") => f.total_dose_gy.map(|v| format!("{v}")),
            (Self::Radiation(f), "fractions") => f.fractions.map(|v| format!("{v}")),
            (Self::Imaging(f), "conclusion") => f.conclusion.clone(),
            (Self::Imaging(f), "modality") => f.modality.clone(),
            (Self::Chemotherapy(f), "agents") => {
                if f.agents.is_empty() {
                    None
                } else {
                    Some(f.agents.join(", "))
                }
            }
            (Self::Chemotherapy(f), "start_date") => f.start_date.clone(),
            _ => None,
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// All known fields present with a non-empty value, required and
    /// optional alike, as canonical (name, value) pairs for merging.
    pub fn present_fields(&self) -> Vec<(&'static str, String)> {
        let names: &[&'static str] = match self {
            Self::Resection(_) => &["resection_extent"],
            Self::Radiation(_) => &["stop_date", "total_dose_gy", "fractions"],
            Self::Imaging(_) => &["conclusion", "modality"],
            Self::Chemotherapy(_) => &["agents", "start_date"],
        };
        names
            .iter()
            .filter_map(|name| self.value_of(name).map(|v| (*name, v)))
            .collect()
    }
}

// ═══════════════════════════════════════════
// Extraction attempt
// ═══════════════════════════════════════════

/// One recorded extraction against one admissible document.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAttempt {
    pub gap_id: Uuid,
    pub document_ref: DocumentRef,
    pub raw_output: String,
    pub parsed: ParsedFields,
    pub confidence: ConfidenceTier,
    pub validation_errors: Vec<String>,
}

// ═══════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════

/// Configuration for the gap-resolution pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Model to use for extraction (e.g., "medgemma:4b").
    pub model_name: String,
    /// Hard bound on candidates tried per gap.
    pub max_candidates_per_gap: usize,
    /// Fresh agent calls allowed when a response is technically retryable
    /// or unparseable (clarification retries are separate and always 1).
    pub max_parse_retries: usize,
    /// Imaging conclusions shorter than this are treated as vague.
    pub min_conclusion_chars: usize,
    /// Minimum category-keyword hits for document admissibility.
    pub min_keyword_matches: usize,
    /// Global extraction-call budget across a run; `None` = unbounded.
    pub max_agent_calls: Option<usize>,
    /// HTTP timeout for agent calls.
    pub agent_timeout_secs: u64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            model_name: "medgemma:4b".to_string(),
            max_candidates_per_gap: 50,
            max_parse_retries: 2,
            min_conclusion_chars: 40,
            min_keyword_matches: 2,
            max_agent_calls: None,
            agent_timeout_secs: 300,
        }
    }
}

// ═══════════════════════════════════════════
// Outcomes & reporting
// ═══════════════════════════════════════════

/// Why a gap ended unresolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No tier produced any candidate.
    DiscoveryExhausted,
    /// Candidates existed but none passed; carries the last missing set.
    CandidatesExhausted { last_missing: Vec<String> },
    /// A technical failure ended the gap (store mid-run, unknown event, ...).
    TechnicalFailure { detail: String },
    /// The global extraction budget ran out mid-escalation.
    BudgetExhausted,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DiscoveryExhausted => write!(f, "no candidate documents found"),
            Self::CandidatesExhausted { last_missing } => write!(
                f,
                "all candidates exhausted; still missing: {}",
                last_missing.join(", ")
            ),
            Self::TechnicalFailure { detail } => write!(f, "technical failure: {detail}"),
            Self::BudgetExhausted => write!(f, "extraction budget exhausted"),
        }
    }
}

/// What happened with one candidate during escalation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Rejected before any extraction call.
    Inadmissible { reason: String },
    TechnicalFailure { detail: String },
    /// First extraction left required fields missing or invalid.
    Incomplete { missing: Vec<String> },
    /// The clarification retry still failed; candidate discarded.
    ClarificationFailed { missing: Vec<String> },
    Passed,
}

/// One row of a gap's escalation history.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub document_ref: DocumentRef,
    pub tier: DiscoveryTier,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Result of running the escalation state machine for one gap.
#[derive(Debug)]
pub struct GapOutcome {
    pub status: GapStatus,
    pub winning: Option<ExtractionAttempt>,
    pub winning_candidate: Option<CandidateDocument>,
    pub reason: Option<UnresolvedReason>,
    pub attempts: Vec<AttemptRecord>,
    pub candidates_tried: usize,
    pub agent_calls: usize,
}

/// Public result of resolving one gap.
#[derive(Debug, Serialize)]
pub struct GapResolution {
    pub gap_id: Uuid,
    pub kind: GapKind,
    pub event_id: String,
    pub status: GapStatus,
    pub fields: Vec<AdjudicatedField>,
    pub reason: Option<UnresolvedReason>,
    pub document_ref: Option<DocumentRef>,
    pub tier: Option<DiscoveryTier>,
    pub attempts: Vec<AttemptRecord>,
}

/// Final report of a full resolution run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub gaps_total: u32,
    pub resolved: u32,
    pub unresolved: u32,
    pub resolutions: Vec<GapResolution>,
    pub completeness: std::collections::BTreeMap<String, SourceCounters>,
    /// Overall succeeded/attempted ratio across logical sources.
    pub completeness_score: f32,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

/// Progress events emitted during a run for a caller-supplied observer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RunProgress {
    Started { gap_count: u32 },
    GapStarted { gap_id: Uuid, kind: GapKind },
    GapFinished { gap_id: Uuid, status: GapStatus },
    Completed { resolved: u32, unresolved: u32, duration_ms: u64 },
}

/// Validate a clinical date string: parseable and within a year of the
/// anchoring event date.
pub fn date_is_reasonable(raw: &str, event_date: NaiveDate) -> bool {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => (date - event_date).num_days().abs() <= 366,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_config_defaults() {
        let config = ResolutionConfig::default();
        assert_eq!(config.max_candidates_per_gap, 50);
        assert_eq!(config.max_parse_retries, 2);
        assert_eq!(config.min_conclusion_chars, 40);
        assert_eq!(config.min_keyword_matches, 2);
        assert_eq!(config.max_agent_calls, None);
        assert_eq!(config.agent_timeout_secs, 300);
    }

    #[test]
    fn resection_fields_accept_alias() {
        let json = serde_json::json!({
            "extent_of_resection": "GTR",
            "confidence": "high",
            "surgeon_comment": "uneventful"
        });
        let parsed = ParsedFields::from_json(GapKind::ResectionExtent, &json).unwrap();
        assert_eq!(parsed.value_of("resection_extent").as_deref(), Some("GTR"));
        assert_eq!(parsed.confidence_tier(), ConfidenceTier::High);
        match parsed {
            ParsedFields::Resection(f) => {
                assert!(f.extra.contains_key("surgeon_comment"), "residual bag keeps extras")
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn radiation_dose_accepts_string_with_unit() {
        let json = serde_json::json!({
            "stop_date": "2024-04-19",
            "total_dose": "59.4 Gy",
            "fractions": 33
        });
        let parsed = ParsedFields::from_json(GapKind::RadiationCourse, &json).unwrap();
        assert_eq!(parsed.value_of("total_dose_gy").as_deref(), Some("59.4"));
        assert_eq!(parsed.value_of("stop_date").as_deref(), Some("2024-04-19"));
        assert_eq!(parsed.value_of("fractions").as_deref(), Some("33"));
    }

    #[test]
    fn chemo_agents_accept_comma_string() {
        let json = serde_json::json!({ "agents": "temozolomide, lomustine" });
        let parsed = ParsedFields::from_json(GapKind::ChemotherapyRegimen, &json).unwrap();
        assert_eq!(
            parsed.value_of("agents").as_deref(),
            Some("temozolomide, lomustine")
        );
    }

    #[test]
    fn missing_confidence_defaults_to_moderate() {
        let json = serde_json::json!({ "conclusion": "Stable disease." });
        let parsed = ParsedFields::from_json(GapKind::ImagingConclusion, &json).unwrap();
        assert_eq!(parsed.confidence_tier(), ConfidenceTier::Moderate);
    }

    #[test]
    fn empty_values_read_as_absent() {
        let json = serde_json::json!({ "resection_extent": "  " });
        let parsed = ParsedFields::from_json(GapKind::ResectionExtent, &json).unwrap();
        assert_eq!(parsed.value_of("resection_extent"), None);
    }

    #[test]
    fn present_fields_lists_optional_extras() {
        let json = serde_json::json!({
            "stop_date": "2024-04-19",
            "total_dose_gy": 59.4,
            "fractions": 33
        });
        let parsed = ParsedFields::from_json(GapKind::RadiationCourse, &json).unwrap();
        let names: Vec<&str> = parsed.present_fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["stop_date", "total_dose_gy", "fractions"]);
    }

    #[test]
    fn unresolved_reason_display() {
        let reason = UnresolvedReason::CandidatesExhausted {
            last_missing: vec!["stop_date".into(), "total_dose_gy".into()],
        };
        let text = reason.to_string();
        assert!(text.contains("stop_date"));
        assert!(text.contains("total_dose_gy"));
    }

    #[test]
    fn date_reasonableness() {
        let anchor = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert!(date_is_reasonable("2024-04-19", anchor));
        assert!(!date_is_reasonable("2020-01-01", anchor));
        assert!(!date_is_reasonable("next spring", anchor));
    }

    #[test]
    fn leading_float_parses_units() {
        assert_eq!(leading_float("59.4 Gy"), Some(59.4));
        assert_eq!(leading_float("54"), Some(54.0));
        assert_eq!(leading_float("unknown"), None);
    }
}
