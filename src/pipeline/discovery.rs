//! Document discovery engine — lazy, tiered candidate production.
//!
//! Candidates are fetched on demand: a tier's search runs only when every
//! earlier tier's ranked list has been consumed. Candidates are deduplicated
//! across tiers by document reference and ordered within a tier by category
//! specificity, then temporal distance.

use std::collections::{BTreeSet, VecDeque};

use crate::models::{CandidateDocument, DiscoveryTier, DocumentRef, GapKind, TimelineEvent};

use super::error::StoreError;
use super::tiers::{category_rank, tier_strategy};
use super::traits::DocumentStore;

pub struct DiscoveryEngine<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> DiscoveryEngine<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub fn stream(&self, kind: GapKind, event: &'a TimelineEvent) -> CandidateStream<'a> {
        CandidateStream {
            store: self.store,
            kind,
            event,
            next_tier: 0,
            current: VecDeque::new(),
            seen: BTreeSet::new(),
            produced: 0,
        }
    }
}

/// Lazy candidate iterator over the six discovery tiers.
pub struct CandidateStream<'a> {
    store: &'a dyn DocumentStore,
    kind: GapKind,
    event: &'a TimelineEvent,
    next_tier: usize,
    current: VecDeque<CandidateDocument>,
    seen: BTreeSet<DocumentRef>,
    produced: usize,
}

impl CandidateStream<'_> {
    /// Pop the next ranked candidate, advancing to the next tier when the
    /// current one is exhausted. `Ok(None)` means every tier is spent.
    pub fn next_candidate(&mut self) -> Result<Option<CandidateDocument>, StoreError> {
        loop {
            if let Some(candidate) = self.current.pop_front() {
                self.produced += 1;
                return Ok(Some(candidate));
            }

            let Some(tier) = DiscoveryTier::all().get(self.next_tier).copied() else {
                return Ok(None);
            };
            self.next_tier += 1;

            let Some(strategy) = tier_strategy(tier, self.kind, self.event) else {
                continue;
            };

            let metas = self.store.search(&strategy)?;
            let mut batch: Vec<CandidateDocument> = metas
                .iter()
                .filter(|meta| !self.seen.contains(&meta.document_ref))
                .map(|meta| {
                    CandidateDocument::from_meta(
                        meta,
                        tier,
                        self.event.date,
                        category_rank(self.kind, meta.category),
                    )
                })
                .collect();
            batch.sort_by_key(|c| c.within_tier_key());

            tracing::debug!(
                gap_kind = %self.kind,
                tier = %tier,
                candidates = batch.len(),
                "Discovery tier produced candidates"
            );

            for candidate in batch {
                self.seen.insert(candidate.document_ref.clone());
                self.current.push_back(candidate);
            }
        }
    }

    /// How many candidates have been handed out so far.
    pub fn produced(&self) -> usize {
        self.produced
    }
}
