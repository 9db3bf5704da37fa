//! Explicit document-text cache, keyed by document reference.
//!
//! Injected into the escalation path instead of living in ambient state, so
//! tests can substitute a fake store and assert on fetch counts.

use std::collections::HashMap;

use crate::models::DocumentRef;

use super::error::StoreError;
use super::traits::DocumentStore;

#[derive(Debug, Default)]
pub struct DocumentTextCache {
    entries: HashMap<DocumentRef, String>,
}

impl DocumentTextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached text, fetching and caching on first access.
    pub fn fetch(
        &mut self,
        store: &dyn DocumentStore,
        document: &DocumentRef,
    ) -> Result<String, StoreError> {
        if let Some(text) = self.entries.get(document) {
            return Ok(text.clone());
        }
        let text = store.fetch_text(document)?;
        self.entries.insert(document.clone(), text.clone());
        Ok(text)
    }

    pub fn contains(&self, document: &DocumentRef) -> bool {
        self.entries.contains_key(document)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMeta;
    use crate::pipeline::traits::InMemoryDocumentStore;

    #[test]
    fn second_fetch_hits_cache() {
        let mut store = InMemoryDocumentStore::new();
        store.add_document(DocumentMeta::new("doc-1"), "operative note");

        let mut cache = DocumentTextCache::new();
        let doc = DocumentRef::new("doc-1");

        assert_eq!(cache.fetch(&store, &doc).unwrap(), "operative note");
        assert_eq!(cache.fetch(&store, &doc).unwrap(), "operative note");
        assert_eq!(store.fetch_count(), 1, "store consulted exactly once");
        assert!(cache.contains(&doc));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn fetch_error_is_not_cached() {
        let store = InMemoryDocumentStore::new();
        let mut cache = DocumentTextCache::new();
        assert!(cache.fetch(&store, &DocumentRef::new("missing")).is_err());
        assert!(cache.is_empty());
    }
}
