//! Equivalence and adjacency tables for adjudication.
//!
//! Which raw values collapse to the same canonical category, and which
//! category pairs count as "adjacent" for partial agreement, are configured
//! data — not control flow. Callers may replace the whole table set.

use serde::{Deserialize, Serialize};

/// One canonical category with its accepted raw aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub field: String,
    pub canonical: String,
    pub aliases: Vec<String>,
}

/// One unordered pair of adjacent categories for a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjacencyEntry {
    pub field: String,
    pub a: String,
    pub b: String,
}

/// The configured equivalence data for all adjudicated fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceTables {
    canonical: Vec<CanonicalEntry>,
    adjacency: Vec<AdjacencyEntry>,
}

impl EquivalenceTables {
    pub fn new(canonical: Vec<CanonicalEntry>, adjacency: Vec<AdjacencyEntry>) -> Self {
        Self { canonical, adjacency }
    }

    pub fn empty() -> Self {
        Self { canonical: Vec::new(), adjacency: Vec::new() }
    }

    /// The hand-authored clinical defaults.
    pub fn default_clinical() -> Self {
        fn entry(field: &str, canonical: &str, aliases: &[&str]) -> CanonicalEntry {
            CanonicalEntry {
                field: field.to_string(),
                canonical: canonical.to_string(),
                aliases: aliases.iter().map(|s| s.to_string()).collect(),
            }
        }
        fn adjacent(field: &str, a: &str, b: &str) -> AdjacencyEntry {
            AdjacencyEntry { field: field.to_string(), a: a.to_string(), b: b.to_string() }
        }

        Self {
            canonical: vec![
                entry(
                    "resection_extent",
                    "GTR",
                    &["gross total resection", "gross-total resection", "complete resection", "total resection"],
                ),
                entry(
                    "resection_extent",
                    "NTR",
                    &["near total resection", "near-total resection"],
                ),
                entry(
                    "resection_extent",
                    "STR",
                    &["subtotal resection", "sub-total resection"],
                ),
                entry(
                    "resection_extent",
                    "partial",
                    &["partial resection", "debulking"],
                ),
                entry("resection_extent", "biopsy", &["biopsy only", "bx"]),
                entry("modality", "MRI", &["mr", "magnetic resonance"]),
                entry("modality", "CT", &["computed tomography", "cat scan"]),
            ],
            adjacency: vec![
                adjacent("resection_extent", "GTR", "NTR"),
                adjacent("resection_extent", "NTR", "STR"),
                adjacent("resection_extent", "STR", "partial"),
            ],
        }
    }

    /// Canonical form of a raw value for a field; unknown values pass
    /// through trimmed.
    pub fn normalize(&self, field: &str, raw: &str) -> String {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        for entry in self.canonical.iter().filter(|e| e.field == field) {
            if entry.canonical.to_lowercase() == lower
                || entry.aliases.iter().any(|a| a.to_lowercase() == lower)
            {
                return entry.canonical.clone();
            }
        }
        trimmed.to_string()
    }

    /// Is this raw value one of the field's declared categories?
    pub fn is_known_category(&self, field: &str, raw: &str) -> bool {
        let normalized = self.normalize(field, raw);
        self.canonical
            .iter()
            .any(|e| e.field == field && e.canonical == normalized)
    }

    /// Are two (already raw) values adjacent for this field? Unordered;
    /// values are normalized first.
    pub fn adjacent(&self, field: &str, left: &str, right: &str) -> bool {
        let left = self.normalize(field, left);
        let right = self.normalize(field, right);
        self.adjacency.iter().any(|pair| {
            pair.field == field
                && ((pair.a == left && pair.b == right) || (pair.a == right && pair.b == left))
        })
    }

    /// The declared categories for a field, in table order.
    pub fn categories_for(&self, field: &str) -> Vec<&str> {
        self.canonical
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.canonical.as_str())
            .collect()
    }
}

impl Default for EquivalenceTables {
    fn default() -> Self {
        Self::default_clinical()
    }
}
