//! Document admissibility — the gate before any extraction call.
//!
//! Two independent checks: (a) the document's declared type must fuzzy-match
//! an expected-type vocabulary for the gap kind, and (b) the text must
//! contain enough category-appropriate terms and none of the category's
//! exclusion terms. Failing either rejects the candidate without spending an
//! extraction call. Missing metadata rejects, never passes.

use crate::models::{CandidateDocument, DocumentCategory, GapKind};

/// Per-category vocabulary and keyword profile.
struct CategoryProfile {
    category: DocumentCategory,
    /// Declared-type strings the warehouse uses for this category.
    type_vocabulary: &'static [&'static str],
    /// Terms expected inside the text.
    content_keywords: &'static [&'static str],
    /// Terms whose presence indicates a clearly different category.
    exclusion_terms: &'static [&'static str],
}

const CATEGORY_PROFILES: &[CategoryProfile] = &[
    CategoryProfile {
        category: DocumentCategory::OperativeRecord,
        type_vocabulary: &["operative", "op note", "op report", "surgical report", "procedure note"],
        content_keywords: &[
            "operative",
            "procedure performed",
            "surgeon",
            "anesthesia",
            "incision",
            "resection",
            "estimated blood loss",
            "specimen",
        ],
        exclusion_terms: &["discharge medications", "discharge disposition"],
    },
    CategoryProfile {
        category: DocumentCategory::DischargeSummary,
        type_vocabulary: &["discharge", "dc summ", "discharge summary"],
        content_keywords: &[
            "discharge",
            "admission",
            "hospital course",
            "disposition",
            "discharge medications",
        ],
        exclusion_terms: &[],
    },
    CategoryProfile {
        category: DocumentCategory::ProgressNote,
        type_vocabulary: &["progress", "progress note", "clinic note", "office visit"],
        content_keywords: &[
            "assessment",
            "plan",
            "interval history",
            "subjective",
            "objective",
            "follow-up",
        ],
        exclusion_terms: &[],
    },
    CategoryProfile {
        category: DocumentCategory::ImagingReport,
        type_vocabulary: &["imaging", "radiology", "mri", "ct", "pet", "x-ray"],
        content_keywords: &[
            "impression",
            "findings",
            "technique",
            "comparison",
            "contrast",
            "sequences",
        ],
        exclusion_terms: &[],
    },
    CategoryProfile {
        category: DocumentCategory::RadiationDocument,
        type_vocabulary: &["radiation", "radiotherapy", "rt summary", "radiation oncology"],
        content_keywords: &[
            "radiation",
            "fraction",
            "gy",
            "dose",
            "treatment field",
            "boost",
            "radiotherapy",
        ],
        exclusion_terms: &[],
    },
    CategoryProfile {
        category: DocumentCategory::HistoryAndPhysical,
        type_vocabulary: &["history and physical", "h&p", "h and p"],
        content_keywords: &[
            "history of present illness",
            "physical exam",
            "review of systems",
            "chief complaint",
        ],
        exclusion_terms: &[],
    },
    CategoryProfile {
        category: DocumentCategory::PathologyReport,
        type_vocabulary: &["pathology", "path report", "surgical pathology"],
        content_keywords: &["specimen", "microscopic", "histologic", "diagnosis", "pathology"],
        exclusion_terms: &[],
    },
];

fn profile_for(category: DocumentCategory) -> Option<&'static CategoryProfile> {
    CATEGORY_PROFILES.iter().find(|p| p.category == category)
}

/// Lowercase substring match in either direction.
fn fuzzy_type_match(declared: &str, vocabulary: &[&str]) -> bool {
    let declared = declared.to_lowercase();
    vocabulary
        .iter()
        .any(|term| declared.contains(term) || term.contains(declared.trim()))
}

/// Verdict of the pre-extraction gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admissibility {
    Admissible,
    Rejected { reason: String },
}

impl Admissibility {
    pub fn is_admissible(&self) -> bool {
        matches!(self, Self::Admissible)
    }
}

/// The pre-extraction document gate.
pub struct DocumentAdmissibility {
    min_keyword_matches: usize,
}

impl DocumentAdmissibility {
    pub fn new(min_keyword_matches: usize) -> Self {
        Self { min_keyword_matches }
    }

    /// Check a fetched candidate's metadata and text against the gap's
    /// accepted categories (primary + declared alternates).
    pub fn check(&self, kind: GapKind, candidate: &CandidateDocument, text: &str) -> Admissibility {
        // (a) metadata/category check; fail-safe when metadata is absent.
        let matched_category = match self.matched_category(kind, candidate) {
            Some(c) => c,
            None => {
                let reason = match (&candidate.category, &candidate.declared_type) {
                    (None, None) => "document metadata unavailable".to_string(),
                    _ => format!(
                        "declared type '{}' does not match any accepted category for {}",
                        candidate
                            .declared_type
                            .as_deref()
                            .or(candidate.category.map(|c| c.as_str()))
                            .unwrap_or("?"),
                        kind
                    ),
                };
                return Admissibility::Rejected { reason };
            }
        };

        // (b) content-keyword check against the matched category's profile.
        let Some(profile) = profile_for(matched_category) else {
            return Admissibility::Rejected {
                reason: format!("no admissibility profile for category {matched_category}"),
            };
        };

        let lower = text.to_lowercase();
        for term in profile.exclusion_terms {
            if lower.contains(term) {
                return Admissibility::Rejected {
                    reason: format!("text contains excluded term '{term}' for {matched_category}"),
                };
            }
        }

        let hits = profile
            .content_keywords
            .iter()
            .filter(|term| lower.contains(**term))
            .count();
        if hits < self.min_keyword_matches {
            return Admissibility::Rejected {
                reason: format!(
                    "only {hits} of {} required {} keywords present",
                    self.min_keyword_matches, matched_category
                ),
            };
        }

        Admissibility::Admissible
    }

    /// Which accepted category the candidate's metadata matches, if any.
    fn matched_category(
        &self,
        kind: GapKind,
        candidate: &CandidateDocument,
    ) -> Option<DocumentCategory> {
        let mut accepted = vec![kind.primary_category()];
        accepted.extend_from_slice(kind.alternate_categories());

        // A normalized category from the warehouse settles it directly.
        if let Some(category) = candidate.category {
            return accepted.contains(&category).then_some(category);
        }

        // Otherwise fall back to the raw declared-type string.
        let declared = candidate.declared_type.as_deref()?;
        accepted.into_iter().find(|category| {
            profile_for(*category)
                .map(|p| fuzzy_type_match(declared, p.type_vocabulary))
                .unwrap_or(false)
        })
    }
}
