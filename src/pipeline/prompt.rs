//! Gap-kind-specific extraction and clarification prompts.
//!
//! Each gap kind carries a JSON schema to fill, domain vocabulary hints, and
//! one worked example. Clarification prompts name exactly the missing fields
//! with per-field guidance and run against the same document.

use crate::models::GapKind;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a medical record field-extraction assistant. Your ONLY role is to
read one clinical document and fill the requested fields.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Extract ONLY information explicitly stated in the document.
2. NEVER add interpretation, diagnosis, advice, or clinical opinion.
3. NEVER infer information that is not directly written.
4. If a field is unclear or missing, output null for that field.
5. Preserve exact values (doses, dates) verbatim from the document.
6. Copy the sentence you read each value from into "evidence_quote".
7. Report your overall confidence as "high", "moderate", or "low".
8. Output MUST be a single JSON object wrapped in ```json``` fences.
"#;

/// Build the extraction prompt for a gap kind against one document.
pub fn build_extraction_prompt(kind: GapKind, document_text: &str) -> String {
    format!(
        "<document>\n{document_text}\n</document>\n\n\
         Fill the following JSON structure from the above document.\n\
         For any field not present in the document, use null.\n\n\
         ```json\n{}\n```\n\n{}\n\nWorked example:\n{}",
        schema_block(kind),
        vocabulary_hints(kind),
        worked_example(kind),
    )
}

/// Build the one targeted follow-up after a partial extraction, naming the
/// missing fields, against the same document.
pub fn build_clarification_prompt(
    kind: GapKind,
    missing: &[String],
    document_text: &str,
) -> String {
    let mut guidance = String::new();
    for field in missing {
        guidance.push_str(&format!("- {}: {}\n", field, field_guidance(kind, field)));
    }

    format!(
        "<document>\n{document_text}\n</document>\n\n\
         Your previous answer for this document left these fields unfilled or\n\
         invalid: {}.\n\n\
         Re-read the document carefully, looking specifically for:\n{guidance}\n\
         Answer with the SAME JSON structure as before:\n\n```json\n{}\n```",
        missing.join(", "),
        schema_block(kind),
    )
}

fn schema_block(kind: GapKind) -> &'static str {
    match kind {
        GapKind::ResectionExtent => {
            r#"{
  "resection_extent": "GTR | NTR | STR | partial | biopsy | null",
  "evidence_quote": "verbatim sentence or null",
  "confidence": "high | moderate | low"
}"#
        }
        GapKind::RadiationCourse => {
            r#"{
  "stop_date": "YYYY-MM-DD or null",
  "total_dose_gy": 0.0,
  "fractions": 0,
  "evidence_quote": "verbatim sentence or null",
  "confidence": "high | moderate | low"
}"#
        }
        GapKind::ImagingConclusion => {
            r#"{
  "conclusion": "the full impression/conclusion text",
  "modality": "MRI | CT | PET | other | null",
  "evidence_quote": "verbatim sentence or null",
  "confidence": "high | moderate | low"
}"#
        }
        GapKind::ChemotherapyRegimen => {
            r#"{
  "agents": ["agent name"],
  "start_date": "YYYY-MM-DD or null",
  "evidence_quote": "verbatim sentence or null",
  "confidence": "high | moderate | low"
}"#
        }
    }
}

fn vocabulary_hints(kind: GapKind) -> &'static str {
    match kind {
        GapKind::ResectionExtent => {
            "Vocabulary: GTR = gross total resection; NTR = near total resection; \
             STR = subtotal resection. Surgeons may also write \"complete resection\" \
             (GTR) or \"debulking\" (partial)."
        }
        GapKind::RadiationCourse => {
            "Vocabulary: total dose is stated in Gy (gray), often as \
             \"54 Gy in 30 fractions\" or \"59.4 Gy at 1.8 Gy/fraction\". The stop \
             date may appear as \"completed radiation on ...\"."
        }
        GapKind::ImagingConclusion => {
            "Vocabulary: the conclusion is usually headed IMPRESSION or CONCLUSION. \
             Copy the full text of that section, not a one-word summary."
        }
        GapKind::ChemotherapyRegimen => {
            "Vocabulary: agents are drug names (e.g. temozolomide, vincristine, \
             carboplatin); a regimen acronym (e.g. PCV) should be expanded to its \
             agents when the document spells them out."
        }
    }
}

fn worked_example(kind: GapKind) -> &'static str {
    match kind {
        GapKind::ResectionExtent => {
            r#"Document says: "A gross total resection of the tumor was achieved."
```json
{
  "resection_extent": "GTR",
  "evidence_quote": "A gross total resection of the tumor was achieved.",
  "confidence": "high"
}
```"#
        }
        GapKind::RadiationCourse => {
            r#"Document says: "The patient completed 54 Gy in 30 fractions on 2023-11-02."
```json
{
  "stop_date": "2023-11-02",
  "total_dose_gy": 54.0,
  "fractions": 30,
  "evidence_quote": "The patient completed 54 Gy in 30 fractions on 2023-11-02.",
  "confidence": "high"
}
```"#
        }
        GapKind::ImagingConclusion => {
            r#"Document says: "IMPRESSION: Stable postoperative changes. No new enhancement."
```json
{
  "conclusion": "Stable postoperative changes. No new enhancement.",
  "modality": "MRI",
  "evidence_quote": "IMPRESSION: Stable postoperative changes. No new enhancement.",
  "confidence": "high"
}
```"#
        }
        GapKind::ChemotherapyRegimen => {
            r#"Document says: "Cycle 1 of temozolomide was started on 2023-12-01."
```json
{
  "agents": ["temozolomide"],
  "start_date": "2023-12-01",
  "evidence_quote": "Cycle 1 of temozolomide was started on 2023-12-01.",
  "confidence": "high"
}
```"#
        }
    }
}

fn field_guidance(kind: GapKind, field: &str) -> &'static str {
    match (kind, field) {
        (GapKind::ResectionExtent, "resection_extent") => {
            "phrases like \"gross total\", \"near total\", \"subtotal\", \
             \"partial resection\", or \"biopsy only\" in the operative findings"
        }
        (GapKind::RadiationCourse, "stop_date") => {
            "a completion or last-treatment date, often near \"completed\", \
             \"final fraction\", or in the treatment summary header"
        }
        (GapKind::RadiationCourse, "total_dose_gy") => {
            "a cumulative dose in Gy, often written as \"<dose> Gy in <n> fractions\""
        }
        (GapKind::RadiationCourse, "fractions") => {
            "the number of fractions delivered, usually next to the total dose"
        }
        (GapKind::ImagingConclusion, "conclusion") => {
            "the IMPRESSION or CONCLUSION section; copy its full text"
        }
        (GapKind::ChemotherapyRegimen, "agents") => {
            "drug names in the treatment plan, orders, or assessment sections"
        }
        (GapKind::ChemotherapyRegimen, "start_date") => {
            "a cycle 1 or first-administration date"
        }
        _ => "any explicit statement of this value anywhere in the document",
    }
}
