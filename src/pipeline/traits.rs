//! Trait definitions for the pipeline's external collaborators, plus the
//! in-memory fakes the tests run against.
//!
//! Two traits define the seams:
//! - ExtractionAgent: the medical text-extraction model behind an HTTP API
//! - DocumentStore: ranked document search + raw text retrieval

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::models::{DocumentMeta, DocumentRef};

use super::error::{AgentError, StoreError};
use super::tiers::SearchStrategy;

/// The medical text-extraction agent.
///
/// `extract` submits one instruction against document text and returns the
/// raw model output; clarification calls are ordinary `extract` calls with a
/// targeted follow-up prompt. Implementations must time out rather than hang.
pub trait ExtractionAgent: Send + Sync {
    fn extract(&self, model: &str, prompt: &str, system: &str) -> Result<String, AgentError>;

    /// Start-up availability probe. Total unavailability is the pipeline's
    /// only fatal condition and must surface here, not gap-by-gap.
    fn health_check(&self) -> Result<(), AgentError>;
}

/// The candidate document store over the clinical warehouse.
pub trait DocumentStore: Send + Sync {
    /// Execute one discovery-tier search strategy.
    fn search(&self, strategy: &SearchStrategy) -> Result<Vec<DocumentMeta>, StoreError>;

    /// Retrieve a document's extracted text.
    fn fetch_text(&self, document: &DocumentRef) -> Result<String, StoreError>;

    fn health_check(&self) -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════
// Test fakes
// ═══════════════════════════════════════════

/// One scripted reply of the mock agent.
#[derive(Debug, Clone)]
pub enum MockReply {
    Reply(String),
    /// Simulated transport failure (connection refused).
    Technical,
}

/// Mock extraction agent — replays a scripted reply sequence.
///
/// The last reply repeats once the script is exhausted, so a single-reply
/// mock behaves like an "always answer X" stub while multi-reply scripts
/// drive clarification/retry paths.
pub struct MockExtractionAgent {
    replies: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<String>>,
    healthy: bool,
}

impl MockExtractionAgent {
    pub fn new(response: &str) -> Self {
        Self::with_script(vec![MockReply::Reply(response.to_string())])
    }

    pub fn with_script(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            healthy: false,
        }
    }

    /// Append another scripted reply (builder style).
    pub fn then(self, response: &str) -> Self {
        self.replies
            .lock()
            .expect("mock lock")
            .push_back(MockReply::Reply(response.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("mock lock").len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("mock lock").clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().expect("mock lock").last().cloned()
    }
}

impl ExtractionAgent for MockExtractionAgent {
    fn extract(&self, _model: &str, prompt: &str, _system: &str) -> Result<String, AgentError> {
        self.prompts.lock().expect("mock lock").push(prompt.to_string());

        let mut replies = self.replies.lock().expect("mock lock");
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };

        match reply {
            Some(MockReply::Reply(r)) => Ok(r),
            Some(MockReply::Technical) => Err(AgentError::Connection("mock agent".into())),
            None => Err(AgentError::Connection("mock agent (no script)".into())),
        }
    }

    fn health_check(&self) -> Result<(), AgentError> {
        if self.healthy {
            Ok(())
        } else {
            Err(AgentError::Connection("mock agent down".into()))
        }
    }
}

/// In-memory document store for testing — executes search strategies over a
/// plain document list.
pub struct InMemoryDocumentStore {
    docs: Vec<DocumentMeta>,
    texts: BTreeMap<DocumentRef, String>,
    healthy: bool,
    fetch_count: Mutex<usize>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: Vec::new(),
            texts: BTreeMap::new(),
            healthy: true,
            fetch_count: Mutex::new(0),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn add_document(&mut self, meta: DocumentMeta, text: &str) {
        self.texts.insert(meta.document_ref.clone(), text.to_string());
        self.docs.push(meta);
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetch_count.lock().expect("store lock")
    }

    fn within(date: Option<chrono::NaiveDate>, center: chrono::NaiveDate, window: i64) -> bool {
        date.map(|d| (d - center).num_days().abs() <= window).unwrap_or(false)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn search(&self, strategy: &SearchStrategy) -> Result<Vec<DocumentMeta>, StoreError> {
        if !self.healthy {
            return Err(StoreError::Unavailable("in-memory store down".into()));
        }

        let matches: Vec<DocumentMeta> = match strategy {
            SearchStrategy::ByDocumentRef { document } => self
                .docs
                .iter()
                .filter(|d| &d.document_ref == document)
                .cloned()
                .collect(),
            SearchStrategy::ByEncounter { encounter_id, categories } => self
                .docs
                .iter()
                .filter(|d| d.encounter_id.as_deref() == Some(encounter_id.as_str()))
                .filter(|d| d.category.map(|c| categories.contains(&c)).unwrap_or(false))
                .cloned()
                .collect(),
            SearchStrategy::ByCategoryNearDate { categories, date, window_days } => self
                .docs
                .iter()
                .filter(|d| d.category.map(|c| categories.contains(&c)).unwrap_or(false))
                .filter(|d| Self::within(d.document_date, *date, *window_days))
                .cloned()
                .collect(),
            SearchStrategy::ByEncounterDate { categories, date, window_days } => self
                .docs
                .iter()
                .filter(|d| d.category.map(|c| categories.contains(&c)).unwrap_or(false))
                .filter(|d| Self::within(d.encounter_date, *date, *window_days))
                .cloned()
                .collect(),
            SearchStrategy::RawIndexScan { date, window_days } => self
                .docs
                .iter()
                .filter(|d| {
                    d.document_date.is_none() || Self::within(d.document_date, *date, *window_days)
                })
                .cloned()
                .collect(),
        };

        Ok(matches)
    }

    fn fetch_text(&self, document: &DocumentRef) -> Result<String, StoreError> {
        if !self.healthy {
            return Err(StoreError::Unavailable("in-memory store down".into()));
        }
        *self.fetch_count.lock().expect("store lock") += 1;
        self.texts
            .get(document)
            .cloned()
            .ok_or_else(|| StoreError::MissingText(document.clone()))
    }

    fn health_check(&self) -> Result<(), StoreError> {
        if self.healthy {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store down".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentCategory;
    use chrono::NaiveDate;

    // Verify traits are object-safe (can be used as `dyn Trait`)
    #[test]
    fn traits_are_object_safe() {
        fn _assert_agent(_: &dyn ExtractionAgent) {}
        fn _assert_store(_: &dyn DocumentStore) {}
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn mock_agent_repeats_single_reply() {
        let agent = MockExtractionAgent::new("hello");
        assert_eq!(agent.extract("m", "p1", "s").unwrap(), "hello");
        assert_eq!(agent.extract("m", "p2", "s").unwrap(), "hello");
        assert_eq!(agent.call_count(), 2);
        assert_eq!(agent.last_prompt().as_deref(), Some("p2"));
    }

    #[test]
    fn mock_agent_plays_script_in_order() {
        let agent = MockExtractionAgent::new("first").then("second");
        assert_eq!(agent.extract("m", "p", "s").unwrap(), "first");
        assert_eq!(agent.extract("m", "p", "s").unwrap(), "second");
        // Last reply repeats
        assert_eq!(agent.extract("m", "p", "s").unwrap(), "second");
    }

    #[test]
    fn mock_agent_technical_reply() {
        let agent = MockExtractionAgent::with_script(vec![
            MockReply::Technical,
            MockReply::Reply("ok".into()),
        ]);
        assert!(matches!(
            agent.extract("m", "p", "s"),
            Err(AgentError::Connection(_))
        ));
        assert_eq!(agent.extract("m", "p", "s").unwrap(), "ok");
    }

    #[test]
    fn unhealthy_agent_fails_health_check() {
        assert!(MockExtractionAgent::new("x").health_check().is_ok());
        assert!(MockExtractionAgent::unhealthy().health_check().is_err());
    }

    #[test]
    fn store_searches_by_category_window() {
        let mut store = InMemoryDocumentStore::new();
        store.add_document(
            DocumentMeta::new("op-1")
                .with_category(DocumentCategory::OperativeRecord)
                .with_date(day(8)),
            "operative note text",
        );
        store.add_document(
            DocumentMeta::new("op-far")
                .with_category(DocumentCategory::OperativeRecord)
                .with_date(day(30)),
            "too far away",
        );

        let found = store
            .search(&SearchStrategy::ByCategoryNearDate {
                categories: vec![DocumentCategory::OperativeRecord],
                date: day(7),
                window_days: 7,
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].document_ref.as_str(), "op-1");
    }

    #[test]
    fn store_encounter_date_ignores_direct_linkage() {
        let mut store = InMemoryDocumentStore::new();
        // Document has no usable document_date but its encounter is dated.
        store.add_document(
            DocumentMeta::new("op-enc")
                .with_category(DocumentCategory::OperativeRecord)
                .with_encounter_date(day(7)),
            "op note via encounter",
        );

        let narrow = store
            .search(&SearchStrategy::ByCategoryNearDate {
                categories: vec![DocumentCategory::OperativeRecord],
                date: day(7),
                window_days: 7,
            })
            .unwrap();
        assert!(narrow.is_empty(), "undated doc invisible to direct temporal match");

        let relaxed = store
            .search(&SearchStrategy::ByEncounterDate {
                categories: vec![DocumentCategory::OperativeRecord],
                date: day(7),
                window_days: 14,
            })
            .unwrap();
        assert_eq!(relaxed.len(), 1);
    }

    #[test]
    fn raw_scan_surfaces_undated_documents() {
        let mut store = InMemoryDocumentStore::new();
        store.add_document(DocumentMeta::new("mystery"), "undated scan");
        let found = store
            .search(&SearchStrategy::RawIndexScan { date: day(7), window_days: 14 })
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn fetch_text_errors_for_unknown_document() {
        let store = InMemoryDocumentStore::new();
        assert!(matches!(
            store.fetch_text(&DocumentRef::new("nope")),
            Err(StoreError::MissingText(_))
        ));
    }
}
