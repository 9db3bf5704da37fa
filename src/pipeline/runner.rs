//! GapResolver — the pipeline facade.
//!
//! Owns the store, agent, and configuration; wires identification →
//! escalation → adjudication → integration, keeps the completeness tracker
//! current, and reports per-gap outcomes without ever aborting the run on a
//! single gap's failure.

use std::time::Instant;

use crate::models::{
    AdjudicatedField, DocumentCategory, ExtractionMethod, Gap, GapStatus, ResolutionSummary,
    SourceAuthority, SourceRecord, TimelineEvent,
};
use crate::timeline::{Timeline, TimelineIntegrator};

use super::adjudication::Adjudicator;
use super::cache::DocumentTextCache;
use super::completeness::{CompletenessTracker, SourceCounters};
use super::discovery::DiscoveryEngine;
use super::equivalence::EquivalenceTables;
use super::error::{AdjudicationError, ResolutionError};
use super::escalation::{CallBudget, EscalationController};
use super::identifier::GapIdentifier;
use super::orchestrator::ExtractionOrchestrator;
use super::traits::{DocumentStore, ExtractionAgent};
use super::types::{
    GapOutcome, GapResolution, ResolutionConfig, RunProgress, RunReport, UnresolvedReason,
};

pub struct GapResolver {
    store: Box<dyn DocumentStore>,
    agent: Box<dyn ExtractionAgent>,
    config: ResolutionConfig,
    adjudicator: Adjudicator,
    tracker: CompletenessTracker,
}

impl GapResolver {
    pub fn new(
        store: Box<dyn DocumentStore>,
        agent: Box<dyn ExtractionAgent>,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            store,
            agent,
            config,
            adjudicator: Adjudicator::default(),
            tracker: CompletenessTracker::new(),
        }
    }

    /// Swap in externally configured equivalence tables.
    pub fn with_tables(mut self, tables: EquivalenceTables) -> Self {
        self.adjudicator = Adjudicator::new(tables);
        self
    }

    /// Start-up availability check. Total unavailability of the agent or
    /// store is the only fatal condition; surface it here rather than
    /// discovering it gap by gap.
    pub fn preflight(&self) -> Result<(), ResolutionError> {
        self.agent
            .health_check()
            .map_err(ResolutionError::AgentUnavailable)?;
        self.store
            .health_check()
            .map_err(ResolutionError::StoreUnavailable)?;
        Ok(())
    }

    pub fn identify_gaps(&self, timeline: &Timeline) -> Vec<Gap> {
        GapIdentifier::new(self.config.min_conclusion_chars).identify(timeline)
    }

    /// Resolve one gap with its own unlimited budget.
    pub fn resolve_gap(&self, gap: &mut Gap, timeline: &Timeline) -> GapResolution {
        let mut budget = CallBudget::new(self.config.max_agent_calls);
        self.resolve_gap_with_budget(gap, timeline, &mut budget)
    }

    /// Resolve one gap against a shared run budget.
    pub fn resolve_gap_with_budget(
        &self,
        gap: &mut Gap,
        timeline: &Timeline,
        budget: &mut CallBudget,
    ) -> GapResolution {
        // A resolved gap is never retried.
        if gap.status() == GapStatus::Resolved {
            return GapResolution {
                gap_id: gap.id,
                kind: gap.kind,
                event_id: gap.event_id.clone(),
                status: GapStatus::Resolved,
                fields: Vec::new(),
                reason: None,
                document_ref: gap.resolution().and_then(|r| r.document_ref.clone()),
                tier: gap.resolution().and_then(|r| r.tier),
                attempts: Vec::new(),
            };
        }

        let Some(event) = timeline.event(&gap.event_id) else {
            let reason = UnresolvedReason::TechnicalFailure {
                detail: format!("event {} not found on the timeline", gap.event_id),
            };
            let _ = gap.mark_unresolved(reason.to_string());
            self.tracker.record_failure(gap.kind.completeness_source());
            return GapResolution {
                gap_id: gap.id,
                kind: gap.kind,
                event_id: gap.event_id.clone(),
                status: GapStatus::Unresolved,
                fields: Vec::new(),
                reason: Some(reason),
                document_ref: None,
                tier: None,
                attempts: Vec::new(),
            };
        };

        let orchestrator = ExtractionOrchestrator::new(
            self.agent.as_ref(),
            &self.config.model_name,
            self.config.max_parse_retries,
        );
        let mut cache = DocumentTextCache::new();
        let mut controller = EscalationController::new(
            gap,
            event,
            self.store.as_ref(),
            &orchestrator,
            self.adjudicator.tables(),
            &mut cache,
            &self.tracker,
            &self.config,
        );
        let engine = DiscoveryEngine::new(self.store.as_ref());
        let mut stream = engine.stream(gap.kind, event);
        let outcome = controller.run(&mut stream, budget);

        self.apply_outcome(gap, event, outcome)
    }

    /// Turn a raw escalation outcome into the adjudicated, audit-ready
    /// resolution and update the gap's status.
    fn apply_outcome(
        &self,
        gap: &mut Gap,
        event: &TimelineEvent,
        outcome: GapOutcome,
    ) -> GapResolution {
        let (document_ref, tier) = outcome
            .winning_candidate
            .as_ref()
            .map(|c| (Some(c.document_ref.clone()), Some(c.tier)))
            .unwrap_or((None, None));

        let mut fields: Vec<AdjudicatedField> = Vec::new();
        let status = outcome.status;

        if status == GapStatus::Resolved {
            if let (Some(attempt), Some(candidate)) =
                (&outcome.winning, &outcome.winning_candidate)
            {
                let authority = authority_for(candidate.category, gap);
                for (name, value) in attempt.parsed.present_fields() {
                    let mut sources = vec![SourceRecord {
                        authority,
                        value,
                        confidence: attempt.confidence.score(),
                        method: ExtractionMethod::AgentExtraction,
                        document_ref: Some(candidate.document_ref.clone()),
                        excerpt: attempt.parsed.evidence_quote().map(|q| q.to_string()),
                    }];

                    // A pre-existing warehouse value for the same field joins
                    // the evidence set so adjudication sees both.
                    if let Some(existing) = event.field(name).filter(|v| !v.is_empty()) {
                        sources.push(SourceRecord {
                            authority: warehouse_authority(gap),
                            value: existing.to_string(),
                            confidence: 0.6,
                            method: ExtractionMethod::WarehouseRecord,
                            document_ref: event.source_document.clone(),
                            excerpt: None,
                        });
                    }

                    match self.adjudicator.adjudicate(name, &sources) {
                        Ok(adjudicated) => fields.push(adjudicated),
                        Err(e) => {
                            tracing::warn!(gap_id = %gap.id, field = name, error = %e, "Adjudication skipped");
                        }
                    }
                }

                let summary = ResolutionSummary {
                    document_ref: document_ref.clone(),
                    tier,
                    fields: fields.iter().map(|f| f.field_name.clone()).collect(),
                };
                if let Err(e) = gap.mark_resolved(summary) {
                    tracing::warn!(gap_id = %gap.id, error = %e, "Gap state transition refused");
                }
            }
        } else if let Some(reason) = &outcome.reason {
            if let Err(e) = gap.mark_unresolved(reason.to_string()) {
                tracing::warn!(gap_id = %gap.id, error = %e, "Gap state transition refused");
            }
        }

        GapResolution {
            gap_id: gap.id,
            kind: gap.kind,
            event_id: gap.event_id.clone(),
            status,
            fields,
            reason: outcome.reason,
            document_ref,
            tier,
            attempts: outcome.attempts,
        }
    }

    /// Identify and resolve every gap, merging resolutions back into the
    /// timeline. Fatal only when preflight fails; per-gap failures land in
    /// the report.
    pub fn resolve_all(
        &self,
        timeline: &mut Timeline,
        progress: Option<&dyn Fn(RunProgress)>,
    ) -> Result<RunReport, ResolutionError> {
        self.preflight()?;
        let start = Instant::now();

        let mut gaps = self.identify_gaps(timeline);
        let mut budget = CallBudget::new(self.config.max_agent_calls);
        let mut integrator = TimelineIntegrator::new();
        let mut resolutions = Vec::with_capacity(gaps.len());
        let mut errors = Vec::new();

        if let Some(progress) = progress {
            progress(RunProgress::Started { gap_count: gaps.len() as u32 });
        }

        for gap in &mut gaps {
            if let Some(progress) = progress {
                progress(RunProgress::GapStarted { gap_id: gap.id, kind: gap.kind });
            }

            let resolution = self.resolve_gap_with_budget(gap, timeline, &mut budget);

            if resolution.status == GapStatus::Resolved {
                if let Err(e) = integrator.merge(timeline, gap, &resolution.fields) {
                    errors.push(format!("gap {}: {e}", gap.id));
                }
            }

            if let Some(progress) = progress {
                progress(RunProgress::GapFinished { gap_id: gap.id, status: resolution.status });
            }
            resolutions.push(resolution);
        }

        let resolved = resolutions.iter().filter(|r| r.status == GapStatus::Resolved).count() as u32;
        let unresolved = resolutions.len() as u32 - resolved;
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Some(progress) = progress {
            progress(RunProgress::Completed { resolved, unresolved, duration_ms });
        }

        tracing::info!(
            gaps = resolutions.len(),
            resolved,
            unresolved,
            duration_ms,
            "Gap resolution run complete"
        );

        Ok(RunReport {
            gaps_total: resolutions.len() as u32,
            resolved,
            unresolved,
            resolutions,
            completeness: self.tracker.snapshot(),
            completeness_score: self.tracker.overall_ratio(),
            duration_ms,
            errors,
        })
    }

    /// Reconcile externally gathered source records for one field.
    pub fn adjudicate(
        &self,
        field_name: &str,
        sources: &[SourceRecord],
    ) -> Result<AdjudicatedField, AdjudicationError> {
        self.adjudicator.adjudicate(field_name, sources)
    }

    pub fn completeness_snapshot(&self) -> std::collections::BTreeMap<String, SourceCounters> {
        self.tracker.snapshot()
    }
}

/// Authority of a value extracted from a document of this category.
fn authority_for(category: Option<DocumentCategory>, gap: &Gap) -> SourceAuthority {
    match category {
        Some(
            DocumentCategory::OperativeRecord
            | DocumentCategory::RadiationDocument
            | DocumentCategory::PathologyReport,
        ) => SourceAuthority::PrimaryProcedural,
        Some(DocumentCategory::ImagingReport) => {
            // For imaging gaps the report IS the primary procedural record.
            if category == Some(gap.kind.primary_category()) {
                SourceAuthority::PrimaryProcedural
            } else {
                SourceAuthority::ObjectiveImaging
            }
        }
        _ => SourceAuthority::SecondaryNarrative,
    }
}

/// Authority of a pre-existing warehouse value on the event itself.
fn warehouse_authority(gap: &Gap) -> SourceAuthority {
    match gap.kind.primary_category() {
        DocumentCategory::ImagingReport => SourceAuthority::ObjectiveImaging,
        _ => SourceAuthority::SecondaryNarrative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMeta, EventKind, FieldValue, GapKind};
    use crate::pipeline::traits::{InMemoryDocumentStore, MockExtractionAgent};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    const OP_TEXT: &str = "OPERATIVE NOTE\nProcedure performed: craniotomy.\n\
        Surgeon: Dr. A. Incision closed. A gross total resection was carried \
        out and the specimen sent to pathology. Estimated blood loss minimal.";

    const GOOD_REPLY: &str = r#"```json
{"resection_extent": "GTR", "evidence_quote": "A gross total resection was carried out.", "confidence": "high"}
```"#;

    fn op_store() -> InMemoryDocumentStore {
        let mut store = InMemoryDocumentStore::new();
        store.add_document(
            DocumentMeta::new("op-1")
                .with_category(crate::models::DocumentCategory::OperativeRecord)
                .with_date(day(8)),
            OP_TEXT,
        );
        store
    }

    fn surgery_timeline() -> Timeline {
        Timeline::from_events(vec![TimelineEvent::new("ev-1", EventKind::Surgery, day(7))])
    }

    fn resolver(store: InMemoryDocumentStore, agent: MockExtractionAgent) -> GapResolver {
        GapResolver::new(Box::new(store), Box::new(agent), ResolutionConfig::default())
    }

    #[test]
    fn preflight_fails_when_agent_is_down() {
        let resolver = resolver(InMemoryDocumentStore::new(), MockExtractionAgent::unhealthy());
        assert!(matches!(
            resolver.preflight(),
            Err(ResolutionError::AgentUnavailable(_))
        ));
    }

    #[test]
    fn preflight_fails_when_store_is_down() {
        let resolver = resolver(InMemoryDocumentStore::unhealthy(), MockExtractionAgent::new("x"));
        assert!(matches!(
            resolver.preflight(),
            Err(ResolutionError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn resolve_gap_fills_and_adjudicates() {
        let resolver = resolver(op_store(), MockExtractionAgent::new(GOOD_REPLY));
        let timeline = surgery_timeline();
        let mut gap = Gap::new(GapKind::ResectionExtent, "ev-1");

        let resolution = resolver.resolve_gap(&mut gap, &timeline);
        assert_eq!(resolution.status, GapStatus::Resolved);
        assert_eq!(gap.status(), GapStatus::Resolved);
        assert_eq!(resolution.fields.len(), 1);

        let field = &resolution.fields[0];
        assert_eq!(field.field_name, "resection_extent");
        assert_eq!(field.final_value, "GTR");
        assert_eq!(field.sources()[0].authority, SourceAuthority::PrimaryProcedural);
        assert!(field.sources()[0].excerpt.as_ref().unwrap().contains("gross total"));
        assert_eq!(
            resolution.document_ref.as_ref().unwrap().as_str(),
            "op-1"
        );
    }

    #[test]
    fn resolved_gap_is_never_retried() {
        let resolver = resolver(op_store(), MockExtractionAgent::new(GOOD_REPLY));
        let timeline = surgery_timeline();
        let mut gap = Gap::new(GapKind::ResectionExtent, "ev-1");

        resolver.resolve_gap(&mut gap, &timeline);
        let again = resolver.resolve_gap(&mut gap, &timeline);
        assert_eq!(again.status, GapStatus::Resolved);
        assert!(again.attempts.is_empty(), "no new escalation for a resolved gap");
        assert_eq!(again.document_ref.as_ref().unwrap().as_str(), "op-1");
    }

    #[test]
    fn missing_event_marks_gap_unresolved() {
        let resolver = resolver(op_store(), MockExtractionAgent::new(GOOD_REPLY));
        let timeline = Timeline::new();
        let mut gap = Gap::new(GapKind::ResectionExtent, "ghost");

        let resolution = resolver.resolve_gap(&mut gap, &timeline);
        assert_eq!(resolution.status, GapStatus::Unresolved);
        assert!(matches!(
            resolution.reason,
            Some(UnresolvedReason::TechnicalFailure { .. })
        ));
        assert_eq!(gap.status(), GapStatus::Unresolved);
    }

    #[test]
    fn conflicting_warehouse_value_becomes_second_source() {
        let resolver = resolver(op_store(), MockExtractionAgent::new(GOOD_REPLY));
        // The event already carries a vague value that conflicts with the
        // extraction; identifier wouldn't flag it, but a remediation caller
        // may still resolve the gap.
        let timeline = Timeline::from_events(vec![TimelineEvent::new(
            "ev-1",
            EventKind::Surgery,
            day(7),
        )
        .with_field("resection_extent", FieldValue::text("NTR"))]);
        let mut gap = Gap::new(GapKind::ResectionExtent, "ev-1");

        let resolution = resolver.resolve_gap(&mut gap, &timeline);
        assert_eq!(resolution.status, GapStatus::Resolved);
        let field = &resolution.fields[0];
        assert_eq!(field.source_count(), 2);
        assert_eq!(field.final_value, "GTR", "agent's primary source outranks warehouse");
        assert_eq!(
            field.agreement,
            crate::models::AgreementStatus::PartialAgreement
        );
        assert!(field
            .sources()
            .iter()
            .any(|s| s.method == ExtractionMethod::WarehouseRecord));
    }

    #[test]
    fn resolve_all_merges_and_reports() {
        let resolver = resolver(op_store(), MockExtractionAgent::new(GOOD_REPLY));
        let mut timeline = surgery_timeline();

        let events = Mutex::new(Vec::new());
        let report = resolver
            .resolve_all(
                &mut timeline,
                Some(&|p: RunProgress| events.lock().unwrap().push(p)),
            )
            .unwrap();

        assert_eq!(report.gaps_total, 1);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.unresolved, 0);
        assert!(report.errors.is_empty());
        assert_eq!(report.completeness_score, 1.0);
        assert_eq!(
            timeline.event("ev-1").unwrap().field_text("resection_extent"),
            Some("GTR")
        );

        let seen = events.lock().unwrap();
        assert!(matches!(seen.first(), Some(RunProgress::Started { gap_count: 1 })));
        assert!(matches!(seen.last(), Some(RunProgress::Completed { resolved: 1, .. })));
    }

    #[test]
    fn resolve_all_requires_preflight() {
        let resolver = resolver(op_store(), MockExtractionAgent::unhealthy());
        let mut timeline = surgery_timeline();
        assert!(resolver.resolve_all(&mut timeline, None).is_err());
    }

    #[test]
    fn one_failing_gap_does_not_abort_the_run() {
        // Store contains an operative record but nothing for imaging, so the
        // imaging gap stays unresolved while the surgical one resolves.
        let mut store = op_store();
        store.add_document(
            DocumentMeta::new("unrelated")
                .with_category(crate::models::DocumentCategory::PathologyReport)
                .with_date(day(9)),
            "specimen microscopic histologic pathology",
        );
        let resolver = resolver(store, MockExtractionAgent::new(GOOD_REPLY));
        let mut timeline = Timeline::from_events(vec![
            TimelineEvent::new("ev-1", EventKind::Surgery, day(7)),
            TimelineEvent::new("ev-2", EventKind::Imaging, day(9)),
        ]);

        let report = resolver.resolve_all(&mut timeline, None).unwrap();
        assert_eq!(report.gaps_total, 2);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.unresolved, 1);

        let unresolved = report
            .resolutions
            .iter()
            .find(|r| r.status == GapStatus::Unresolved)
            .unwrap();
        assert_eq!(unresolved.kind, GapKind::ImagingConclusion);
        assert!(unresolved.reason.is_some());

        let counters = report.completeness;
        assert_eq!(counters.get("surgery records").unwrap().succeeded, 1);
        assert_eq!(counters.get("imaging reports").unwrap().failed, 1);
    }

    #[test]
    fn run_budget_limits_total_agent_calls() {
        let mut config = ResolutionConfig::default();
        config.max_agent_calls = Some(1);
        let resolver = GapResolver::new(
            Box::new(op_store()),
            Box::new(MockExtractionAgent::new(GOOD_REPLY)),
            config,
        );
        let mut timeline = Timeline::from_events(vec![
            TimelineEvent::new("ev-1", EventKind::Surgery, day(7)),
            TimelineEvent::new("ev-2", EventKind::Surgery, day(8)),
        ]);

        let report = resolver.resolve_all(&mut timeline, None).unwrap();
        assert_eq!(report.resolved, 1);
        assert_eq!(report.unresolved, 1);
        let abandoned = report
            .resolutions
            .iter()
            .find(|r| r.status == GapStatus::Unresolved)
            .unwrap();
        assert_eq!(abandoned.reason, Some(UnresolvedReason::BudgetExhausted));
    }

    #[test]
    fn adjudicate_is_exposed_for_external_sources() {
        let resolver = resolver(InMemoryDocumentStore::new(), MockExtractionAgent::new("x"));
        let field = resolver
            .adjudicate(
                "resection_extent",
                &[
                    SourceRecord::new(SourceAuthority::PrimaryProcedural, "GTR", 0.9),
                    SourceRecord::new(SourceAuthority::ObjectiveImaging, "NTR", 0.8),
                ],
            )
            .unwrap();
        assert_eq!(field.final_value, "GTR");
    }
}
