//! Discovery tier strategies.
//!
//! Each tier is a pure function from (gap kind, event) to the search the
//! document store should run. Tiers are independently testable and
//! reorderable; the discovery engine iterates them in ordinal order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
    DiscoveryTier, DocumentCategory, DocumentRef, GapKind, TimelineEvent,
};

/// A concrete search the document store knows how to execute.
/// Query construction against the warehouse is the store's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Resolve one explicitly referenced document.
    ByDocumentRef { document: DocumentRef },
    /// Documents linked to an encounter, restricted by category.
    ByEncounter {
        encounter_id: String,
        categories: Vec<DocumentCategory>,
    },
    /// Documents of given categories dated within a window of a date.
    ByCategoryNearDate {
        categories: Vec<DocumentCategory>,
        date: NaiveDate,
        window_days: i64,
    },
    /// Same, but matched on the owning encounter's date instead of direct
    /// document linkage (covers missing or wrong document-to-encounter links).
    ByEncounterDate {
        categories: Vec<DocumentCategory>,
        date: NaiveDate,
        window_days: i64,
    },
    /// Scan the most primitive available document index near a date,
    /// bypassing derived linkage views.
    RawIndexScan { date: NaiveDate, window_days: i64 },
}

/// Build the search strategy one tier would run for this gap, or `None`
/// when the tier does not apply (no direct link, no encounter).
pub fn tier_strategy(
    tier: DiscoveryTier,
    kind: GapKind,
    event: &TimelineEvent,
) -> Option<SearchStrategy> {
    match tier {
        DiscoveryTier::DirectLink => event
            .source_document
            .clone()
            .map(|document| SearchStrategy::ByDocumentRef { document }),
        DiscoveryTier::EncounterLink => {
            event.encounter_id.clone().map(|encounter_id| SearchStrategy::ByEncounter {
                encounter_id,
                categories: vec![kind.primary_category()],
            })
        }
        DiscoveryTier::TemporalNarrow => Some(SearchStrategy::ByCategoryNearDate {
            categories: vec![kind.primary_category()],
            date: event.date,
            window_days: kind.narrow_window_days(),
        }),
        DiscoveryTier::TemporalRelaxed => Some(SearchStrategy::ByEncounterDate {
            categories: vec![kind.primary_category()],
            date: event.date,
            window_days: kind.relaxed_window_days(),
        }),
        DiscoveryTier::AlternateCategory => Some(SearchStrategy::ByCategoryNearDate {
            categories: kind.alternate_categories().to_vec(),
            date: event.date,
            window_days: kind.alternate_window_days(),
        }),
        DiscoveryTier::RawScan => Some(SearchStrategy::RawIndexScan {
            date: event.date,
            window_days: kind.alternate_window_days().max(kind.relaxed_window_days()),
        }),
    }
}

/// Within-tier rank of a candidate's category for this gap kind.
/// 0 = the gap's primary category; alternates follow their declared order;
/// unknown or missing categories rank last.
pub fn category_rank(kind: GapKind, category: Option<DocumentCategory>) -> u8 {
    match category {
        Some(c) if c == kind.primary_category() => 0,
        Some(c) => kind
            .alternate_categories()
            .iter()
            .position(|alt| *alt == c)
            .map(|i| (i + 1) as u8)
            .unwrap_or(u8::MAX - 1),
        None => u8::MAX,
    }
}
