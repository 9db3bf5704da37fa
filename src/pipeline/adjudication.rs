//! Multi-source adjudication — deterministic reconciliation of independent
//! values for the same field into one final value with a rationale.
//!
//! No agent call is required; an optional advisory query may be attached to
//! explain a discrepancy, but its answer never overrides the rule.

use crate::models::{AdjudicatedField, AgreementStatus, SourceRecord};

use super::error::AdjudicationError;
use super::equivalence::EquivalenceTables;
use super::traits::ExtractionAgent;

/// Confidence boost when ≥2 sources fully agree, capped.
const AGREEMENT_BOOST: f32 = 0.05;
const CONFIDENCE_CAP: f32 = 0.98;
/// Confidence penalty factor on discrepancy.
const DISCREPANCY_PENALTY: f32 = 0.85;

pub struct Adjudicator {
    tables: EquivalenceTables,
}

impl Adjudicator {
    pub fn new(tables: EquivalenceTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &EquivalenceTables {
        &self.tables
    }

    /// Reconcile the sources for one field. Deterministic: the same inputs
    /// always produce the same value, agreement, and confidence.
    pub fn adjudicate(
        &self,
        field_name: &str,
        sources: &[SourceRecord],
    ) -> Result<AdjudicatedField, AdjudicationError> {
        if sources.is_empty() {
            return Err(AdjudicationError::NoSources(field_name.to_string()));
        }

        // Authority ranking, confidence as tiebreak; stable sort keeps
        // input order for exact ties, so the result is deterministic.
        let mut ranked: Vec<&SourceRecord> = sources.iter().collect();
        ranked.sort_by(|a, b| {
            a.authority.rank().cmp(&b.authority.rank()).then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        let top = ranked[0];

        let normalized: Vec<String> = sources
            .iter()
            .map(|s| self.tables.normalize(field_name, &s.value))
            .collect();
        let agreement = self.agreement_status(field_name, &normalized);

        let final_value = self.tables.normalize(field_name, &top.value);
        let final_confidence = match agreement {
            AgreementStatus::SingleSource | AgreementStatus::PartialAgreement => top.confidence,
            AgreementStatus::FullAgreement => (top.confidence + AGREEMENT_BOOST).min(CONFIDENCE_CAP),
            AgreementStatus::Discrepancy => top.confidence * DISCREPANCY_PENALTY,
        };

        let rationale = build_rationale(field_name, sources, &normalized, agreement, top, &final_value);

        if agreement == AgreementStatus::Discrepancy {
            tracing::warn!(
                field = field_name,
                sources = sources.len(),
                final_value = %final_value,
                "Source discrepancy recorded during adjudication"
            );
        }

        Ok(AdjudicatedField::new(
            field_name.to_string(),
            sources.to_vec(),
            agreement,
            final_value,
            final_confidence,
            rationale,
        ))
    }

    /// Adjudicate, then ask the agent to explain a discrepancy. The
    /// explanation is stored as an advisory note only; the adjudicated
    /// value is unchanged, and an agent failure is ignored.
    pub fn adjudicate_with_advisory(
        &self,
        field_name: &str,
        sources: &[SourceRecord],
        agent: &dyn ExtractionAgent,
        model: &str,
    ) -> Result<AdjudicatedField, AdjudicationError> {
        let mut adjudicated = self.adjudicate(field_name, sources)?;

        if adjudicated.agreement == AgreementStatus::Discrepancy {
            let listing: Vec<String> = sources
                .iter()
                .map(|s| format!("{} reported '{}'", s.authority, s.value))
                .collect();
            let prompt = format!(
                "Clinical sources disagree on the field '{field_name}': {}. \
                 In two sentences, explain the most likely reason these sources differ. \
                 Do not pick a winner.",
                listing.join("; ")
            );
            match agent.extract(model, &prompt, "You are a clinical documentation analyst.") {
                Ok(note) => adjudicated.set_advisory(note.trim().to_string()),
                Err(e) => {
                    tracing::warn!(field = field_name, error = %e, "Advisory query failed, continuing without note");
                }
            }
        }

        Ok(adjudicated)
    }

    fn agreement_status(&self, field_name: &str, normalized: &[String]) -> AgreementStatus {
        if normalized.len() == 1 {
            return AgreementStatus::SingleSource;
        }
        if normalized.iter().all(|v| v == &normalized[0]) {
            return AgreementStatus::FullAgreement;
        }
        // Partial agreement: every pair is identical or pre-declared adjacent.
        let all_adjacent = normalized.iter().enumerate().all(|(i, left)| {
            normalized.iter().skip(i + 1).all(|right| {
                left == right || self.tables.adjacent(field_name, left, right)
            })
        });
        if all_adjacent {
            AgreementStatus::PartialAgreement
        } else {
            AgreementStatus::Discrepancy
        }
    }
}

impl Default for Adjudicator {
    fn default() -> Self {
        Self::new(EquivalenceTables::default_clinical())
    }
}

fn build_rationale(
    field_name: &str,
    sources: &[SourceRecord],
    normalized: &[String],
    agreement: AgreementStatus,
    top: &SourceRecord,
    final_value: &str,
) -> String {
    if sources.len() == 1 {
        return format!(
            "Single source: {} reported '{final_value}' (confidence {:.2}).",
            top.authority, top.confidence
        );
    }

    let compared: Vec<String> = sources
        .iter()
        .zip(normalized)
        .map(|(s, n)| format!("{} reported '{}' (confidence {:.2})", s.authority, n, s.confidence))
        .collect();

    let verdict = match agreement {
        AgreementStatus::FullAgreement => "All sources agree".to_string(),
        AgreementStatus::PartialAgreement => "Values fall in adjacent categories".to_string(),
        AgreementStatus::Discrepancy => "Sources disagree".to_string(),
        AgreementStatus::SingleSource => unreachable!("handled above"),
    };

    format!(
        "Compared {} for '{field_name}': {}. {verdict}; selected '{final_value}' from {} (highest authority{}).",
        sources.len(),
        compared.join("; "),
        top.authority,
        if agreement == AgreementStatus::Discrepancy { ", confidence penalized" } else { "" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMethod, SourceAuthority};
    use crate::pipeline::traits::MockExtractionAgent;

    fn source(authority: SourceAuthority, value: &str, confidence: f32) -> SourceRecord {
        SourceRecord::new(authority, value, confidence)
    }

    #[test]
    fn empty_sources_is_an_error() {
        let adjudicator = Adjudicator::default();
        assert!(matches!(
            adjudicator.adjudicate("resection_extent", &[]),
            Err(AdjudicationError::NoSources(_))
        ));
    }

    #[test]
    fn single_source_passthrough() {
        let adjudicator = Adjudicator::default();
        let field = adjudicator
            .adjudicate(
                "resection_extent",
                &[source(SourceAuthority::PrimaryProcedural, "gross total resection", 0.9)],
            )
            .unwrap();
        assert_eq!(field.agreement, AgreementStatus::SingleSource);
        assert_eq!(field.final_value, "GTR");
        assert_eq!(field.final_confidence, 0.9);
        assert!(field.rationale.contains("Single source"));
    }

    // Scenario from the design discussion: primary procedural GTR @0.9 vs
    // objective imaging NTR @0.8 with GTR/NTR declared adjacent.
    #[test]
    fn adjacent_values_partial_agreement_authority_wins() {
        let adjudicator = Adjudicator::default();
        let field = adjudicator
            .adjudicate(
                "resection_extent",
                &[
                    source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
                    source(SourceAuthority::ObjectiveImaging, "NTR", 0.8),
                ],
            )
            .unwrap();
        assert_eq!(field.agreement, AgreementStatus::PartialAgreement);
        assert_eq!(field.final_value, "GTR");
        assert!(field.final_confidence >= 0.8 && field.final_confidence <= 0.95);
        assert_eq!(field.source_count(), 2);
        assert!(field.rationale.contains("primary_procedural"));
        assert!(field.rationale.contains("objective_imaging"));
    }

    #[test]
    fn full_agreement_boosts_confidence() {
        let adjudicator = Adjudicator::default();
        let field = adjudicator
            .adjudicate(
                "resection_extent",
                &[
                    source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
                    source(SourceAuthority::SecondaryNarrative, "gross total resection", 0.7),
                ],
            )
            .unwrap();
        assert_eq!(field.agreement, AgreementStatus::FullAgreement);
        assert!((field.final_confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn agreement_boost_is_capped() {
        let adjudicator = Adjudicator::default();
        let field = adjudicator
            .adjudicate(
                "resection_extent",
                &[
                    source(SourceAuthority::PrimaryProcedural, "GTR", 0.97),
                    source(SourceAuthority::SecondaryNarrative, "GTR", 0.97),
                ],
            )
            .unwrap();
        assert!(field.final_confidence <= 0.98);
    }

    #[test]
    fn discrepancy_penalizes_confidence_and_keeps_authority_winner() {
        let adjudicator = Adjudicator::default();
        let field = adjudicator
            .adjudicate(
                "resection_extent",
                &[
                    source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
                    source(SourceAuthority::ObjectiveImaging, "biopsy", 0.8),
                ],
            )
            .unwrap();
        assert_eq!(field.agreement, AgreementStatus::Discrepancy);
        assert_eq!(field.final_value, "GTR");
        assert!((field.final_confidence - 0.9 * 0.85).abs() < 1e-6);
        assert!(field.rationale.contains("disagree"));
    }

    #[test]
    fn confidence_breaks_authority_ties() {
        let adjudicator = Adjudicator::default();
        let field = adjudicator
            .adjudicate(
                "resection_extent",
                &[
                    source(SourceAuthority::SecondaryNarrative, "STR", 0.6),
                    source(SourceAuthority::SecondaryNarrative, "NTR", 0.8),
                ],
            )
            .unwrap();
        assert_eq!(field.final_value, "NTR");
    }

    #[test]
    fn adjudication_is_deterministic() {
        let adjudicator = Adjudicator::default();
        let sources = vec![
            source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
            source(SourceAuthority::ObjectiveImaging, "NTR", 0.8),
            source(SourceAuthority::SecondaryNarrative, "near total resection", 0.85),
        ];
        let first = adjudicator.adjudicate("resection_extent", &sources).unwrap();
        for _ in 0..5 {
            let again = adjudicator.adjudicate("resection_extent", &sources).unwrap();
            assert_eq!(again.final_value, first.final_value);
            assert_eq!(again.agreement, first.agreement);
            assert_eq!(again.final_confidence, first.final_confidence);
            assert_eq!(again.rationale, first.rationale);
        }
    }

    #[test]
    fn three_way_chain_is_discrepancy_not_partial() {
        // GTR~NTR and NTR~STR are adjacent, but GTR and STR are not:
        // the set as a whole is a discrepancy.
        let adjudicator = Adjudicator::default();
        let field = adjudicator
            .adjudicate(
                "resection_extent",
                &[
                    source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
                    source(SourceAuthority::SecondaryNarrative, "NTR", 0.8),
                    source(SourceAuthority::ObjectiveImaging, "STR", 0.8),
                ],
            )
            .unwrap();
        assert_eq!(field.agreement, AgreementStatus::Discrepancy);
    }

    #[test]
    fn advisory_note_stored_but_value_unchanged() {
        let adjudicator = Adjudicator::default();
        let agent = MockExtractionAgent::new(
            "The operative impression often precedes the postoperative imaging.",
        );
        let sources = vec![
            source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
            source(SourceAuthority::ObjectiveImaging, "biopsy", 0.8),
        ];

        let field = adjudicator
            .adjudicate_with_advisory("resection_extent", &sources, &agent, "medgemma:4b")
            .unwrap();
        assert_eq!(field.final_value, "GTR");
        assert!(field.advisory_note.as_ref().unwrap().contains("operative impression"));
        assert_eq!(agent.call_count(), 1);
    }

    #[test]
    fn advisory_skipped_without_discrepancy() {
        let adjudicator = Adjudicator::default();
        let agent = MockExtractionAgent::new("should not be called");
        let sources = vec![
            source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
            source(SourceAuthority::SecondaryNarrative, "GTR", 0.8),
        ];
        let field = adjudicator
            .adjudicate_with_advisory("resection_extent", &sources, &agent, "medgemma:4b")
            .unwrap();
        assert!(field.advisory_note.is_none());
        assert_eq!(agent.call_count(), 0);
    }

    #[test]
    fn advisory_failure_is_ignored() {
        let adjudicator = Adjudicator::default();
        let agent = MockExtractionAgent::unhealthy();
        let sources = vec![
            source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
            source(SourceAuthority::ObjectiveImaging, "biopsy", 0.8),
        ];
        // Unhealthy mock errors on extract; adjudication still succeeds.
        let field = adjudicator
            .adjudicate_with_advisory("resection_extent", &sources, &agent, "medgemma:4b")
            .unwrap();
        assert!(field.advisory_note.is_none());
        assert_eq!(field.final_value, "GTR");
    }

    #[test]
    fn warehouse_and_agent_sources_mix() {
        let adjudicator = Adjudicator::default();
        let sources = vec![
            source(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
            source(SourceAuthority::SecondaryNarrative, "GTR", 0.6)
                .with_method(ExtractionMethod::WarehouseRecord),
        ];
        let field = adjudicator.adjudicate("resection_extent", &sources).unwrap();
        assert_eq!(field.agreement, AgreementStatus::FullAgreement);
        assert_eq!(field.sources().len(), 2);
    }
}
