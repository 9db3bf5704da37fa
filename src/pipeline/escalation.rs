//! Escalation controller — the per-gap state machine.
//!
//! Open → TryingCandidate → (Clarifying) → (Escalating) → Resolved | Unresolved.
//! Iterative and bounded, never recursive: the loop pops candidates from the
//! discovery stream, gates them through admissibility, extracts, validates,
//! clarifies once, and escalates. The full history stays observable on the
//! outcome, and a budget stop abandons the gap cleanly as unresolved.

use serde::Serialize;

use crate::models::{Gap, GapStatus, TimelineEvent};

use super::admissibility::{Admissibility, DocumentAdmissibility};
use super::cache::DocumentTextCache;
use super::completeness::CompletenessTracker;
use super::discovery::CandidateStream;
use super::equivalence::EquivalenceTables;
use super::orchestrator::ExtractionOrchestrator;
use super::traits::DocumentStore;
use super::types::{
    AttemptOutcome, AttemptRecord, ExtractionAttempt, GapOutcome, ResolutionConfig,
    UnresolvedReason,
};
use super::validation::check_attempt;

/// Observable state of the per-gap machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    Open,
    TryingCandidate,
    Clarifying,
    Escalating,
    Resolved,
    Unresolved,
}

impl EscalationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::TryingCandidate => "trying_candidate",
            Self::Clarifying => "clarifying",
            Self::Escalating => "escalating",
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for EscalationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared extraction-call budget for a run. Exhaustion abandons the current
/// gap as unresolved rather than leaving it half-applied.
#[derive(Debug)]
pub struct CallBudget {
    limit: Option<usize>,
    used: usize,
}

impl CallBudget {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit, used: 0 }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Charge one orchestrator invocation. Returns false when spent.
    pub fn try_charge(&mut self) -> bool {
        match self.limit {
            Some(limit) if self.used >= limit => false,
            _ => {
                self.used += 1;
                true
            }
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.used >= limit)
    }
}

pub struct EscalationController<'a> {
    gap: &'a Gap,
    event: &'a TimelineEvent,
    store: &'a dyn DocumentStore,
    orchestrator: &'a ExtractionOrchestrator<'a>,
    admissibility: DocumentAdmissibility,
    tables: &'a EquivalenceTables,
    cache: &'a mut DocumentTextCache,
    tracker: &'a CompletenessTracker,
    config: &'a ResolutionConfig,
    state: EscalationState,
}

impl<'a> EscalationController<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gap: &'a Gap,
        event: &'a TimelineEvent,
        store: &'a dyn DocumentStore,
        orchestrator: &'a ExtractionOrchestrator<'a>,
        tables: &'a EquivalenceTables,
        cache: &'a mut DocumentTextCache,
        tracker: &'a CompletenessTracker,
        config: &'a ResolutionConfig,
    ) -> Self {
        Self {
            gap,
            event,
            store,
            orchestrator,
            admissibility: DocumentAdmissibility::new(config.min_keyword_matches),
            tables,
            cache,
            tracker,
            config,
            state: EscalationState::Open,
        }
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// Drive the gap to Resolved or Unresolved. Never retries a resolved
    /// gap and never panics out of a single gap's failure.
    pub fn run(&mut self, stream: &mut CandidateStream<'_>, budget: &mut CallBudget) -> GapOutcome {
        let source = self.gap.kind.completeness_source();
        self.tracker.record_attempt(source);

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        // Before any extraction, every required field is still missing.
        let mut last_missing: Vec<String> = self
            .gap
            .required_fields()
            .iter()
            .map(|spec| spec.name.to_string())
            .collect();
        let mut tried = 0usize;
        let mut agent_calls = 0usize;

        while tried < self.config.max_candidates_per_gap {
            self.state = EscalationState::TryingCandidate;

            let candidate = match stream.next_candidate() {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    let reason = if tried == 0 && attempts.is_empty() {
                        UnresolvedReason::DiscoveryExhausted
                    } else {
                        UnresolvedReason::CandidatesExhausted { last_missing: last_missing.clone() }
                    };
                    return self.unresolved(reason, attempts, tried, agent_calls);
                }
                Err(e) => {
                    return self.unresolved(
                        UnresolvedReason::TechnicalFailure { detail: e.to_string() },
                        attempts,
                        tried,
                        agent_calls,
                    );
                }
            };
            tried += 1;

            // Fetch text; a fetch failure burns the candidate, not the gap.
            let text = match self.cache.fetch(self.store, &candidate.document_ref) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        gap_id = %self.gap.id,
                        document = %candidate.document_ref,
                        error = %e,
                        "Candidate text fetch failed, advancing"
                    );
                    attempts.push(AttemptRecord {
                        document_ref: candidate.document_ref.clone(),
                        tier: candidate.tier,
                        outcome: AttemptOutcome::TechnicalFailure { detail: e.to_string() },
                    });
                    continue;
                }
            };

            // Admissibility gate: rejection spends no extraction call and
            // records no ExtractionAttempt.
            if let Admissibility::Rejected { reason } =
                self.admissibility.check(self.gap.kind, &candidate, &text)
            {
                tracing::debug!(
                    gap_id = %self.gap.id,
                    document = %candidate.document_ref,
                    reason = %reason,
                    "Candidate inadmissible, advancing"
                );
                attempts.push(AttemptRecord {
                    document_ref: candidate.document_ref.clone(),
                    tier: candidate.tier,
                    outcome: AttemptOutcome::Inadmissible { reason },
                });
                continue;
            }

            if !budget.try_charge() {
                return self.unresolved(
                    UnresolvedReason::BudgetExhausted,
                    attempts,
                    tried,
                    agent_calls,
                );
            }
            agent_calls += 1;

            let attempt = match self.orchestrator.extract(self.gap, &candidate, &text) {
                Ok(attempt) => attempt,
                Err(e) => {
                    attempts.push(AttemptRecord {
                        document_ref: candidate.document_ref.clone(),
                        tier: candidate.tier,
                        outcome: AttemptOutcome::TechnicalFailure { detail: e.to_string() },
                    });
                    self.state = EscalationState::Escalating;
                    continue;
                }
            };

            let check = check_attempt(
                self.gap.kind,
                &attempt.parsed,
                attempt.confidence,
                self.event.date,
                self.tables,
                self.config.min_conclusion_chars,
            );
            if check.passed() {
                attempts.push(AttemptRecord {
                    document_ref: candidate.document_ref.clone(),
                    tier: candidate.tier,
                    outcome: AttemptOutcome::Passed,
                });
                return self.resolved(attempt, candidate, attempts, tried, agent_calls);
            }

            let to_clarify = check.fields_to_clarify();
            if to_clarify.is_empty() {
                // Complete but low-confidence: there is no field to name in
                // a follow-up, so escalate straight to the next candidate.
                attempts.push(AttemptRecord {
                    document_ref: candidate.document_ref.clone(),
                    tier: candidate.tier,
                    outcome: AttemptOutcome::Incomplete { missing: Vec::new() },
                });
                self.state = EscalationState::Escalating;
                continue;
            }
            last_missing = to_clarify.clone();

            // Exactly one targeted follow-up against the same document.
            self.state = EscalationState::Clarifying;
            if !budget.try_charge() {
                return self.unresolved(
                    UnresolvedReason::BudgetExhausted,
                    attempts,
                    tried,
                    agent_calls,
                );
            }
            agent_calls += 1;

            let clarified = match self.orchestrator.clarify(self.gap, &candidate, &text, &to_clarify)
            {
                Ok(attempt) => attempt,
                Err(e) => {
                    attempts.push(AttemptRecord {
                        document_ref: candidate.document_ref.clone(),
                        tier: candidate.tier,
                        outcome: AttemptOutcome::TechnicalFailure { detail: e.to_string() },
                    });
                    self.state = EscalationState::Escalating;
                    continue;
                }
            };

            let recheck = check_attempt(
                self.gap.kind,
                &clarified.parsed,
                clarified.confidence,
                self.event.date,
                self.tables,
                self.config.min_conclusion_chars,
            );
            if recheck.passed() {
                attempts.push(AttemptRecord {
                    document_ref: candidate.document_ref.clone(),
                    tier: candidate.tier,
                    outcome: AttemptOutcome::Passed,
                });
                return self.resolved(clarified, candidate, attempts, tried, agent_calls);
            }

            let still_missing = recheck.fields_to_clarify();
            if !still_missing.is_empty() {
                last_missing = still_missing.clone();
            }
            attempts.push(AttemptRecord {
                document_ref: candidate.document_ref.clone(),
                tier: candidate.tier,
                outcome: AttemptOutcome::ClarificationFailed { missing: still_missing },
            });
            self.state = EscalationState::Escalating;
        }

        self.unresolved(
            UnresolvedReason::CandidatesExhausted { last_missing },
            attempts,
            tried,
            agent_calls,
        )
    }

    fn resolved(
        &mut self,
        attempt: ExtractionAttempt,
        candidate: crate::models::CandidateDocument,
        attempts: Vec<AttemptRecord>,
        tried: usize,
        agent_calls: usize,
    ) -> GapOutcome {
        self.state = EscalationState::Resolved;
        let source = self.gap.kind.completeness_source();
        self.tracker.record_success(source);
        self.tracker.add_records(source, 1);
        tracing::info!(
            gap_id = %self.gap.id,
            gap_kind = %self.gap.kind,
            document = %candidate.document_ref,
            tier = %candidate.tier,
            candidates_tried = tried,
            "Gap resolved"
        );
        GapOutcome {
            status: GapStatus::Resolved,
            winning: Some(attempt),
            winning_candidate: Some(candidate),
            reason: None,
            attempts,
            candidates_tried: tried,
            agent_calls,
        }
    }

    fn unresolved(
        &mut self,
        reason: UnresolvedReason,
        attempts: Vec<AttemptRecord>,
        tried: usize,
        agent_calls: usize,
    ) -> GapOutcome {
        self.state = EscalationState::Unresolved;
        let source = self.gap.kind.completeness_source();
        self.tracker.record_failure(source);
        tracing::info!(
            gap_id = %self.gap.id,
            gap_kind = %self.gap.kind,
            reason = %reason,
            candidates_tried = tried,
            "Gap unresolved"
        );
        GapOutcome {
            status: GapStatus::Unresolved,
            winning: None,
            winning_candidate: None,
            reason: Some(reason),
            attempts,
            candidates_tried: tried,
            agent_calls,
        }
    }
}
