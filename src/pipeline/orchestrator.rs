//! Extraction orchestrator — builds the gap-specific instruction, drives the
//! agent, and wraps the response into an `ExtractionAttempt`.
//!
//! Transport failures and unparseable responses get a bounded number of
//! fresh calls; the one targeted clarification retry is the escalation
//! controller's decision, not ours.

use crate::models::{CandidateDocument, Gap};

use super::error::AgentError;
use super::prompt::{build_clarification_prompt, build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::sanitize::{extract_json_block, sanitize_agent_output};
use super::traits::ExtractionAgent;
use super::types::{ExtractionAttempt, ParsedFields};

pub struct ExtractionOrchestrator<'a> {
    agent: &'a dyn ExtractionAgent,
    model: &'a str,
    max_retries: usize,
}

impl<'a> ExtractionOrchestrator<'a> {
    pub fn new(agent: &'a dyn ExtractionAgent, model: &'a str, max_retries: usize) -> Self {
        Self { agent, model, max_retries }
    }

    /// First extraction against a candidate document.
    pub fn extract(
        &self,
        gap: &Gap,
        candidate: &CandidateDocument,
        text: &str,
    ) -> Result<ExtractionAttempt, AgentError> {
        let prompt = build_extraction_prompt(gap.kind, text);
        self.call(gap, candidate, &prompt)
    }

    /// The one targeted follow-up naming the missing fields, against the
    /// same document.
    pub fn clarify(
        &self,
        gap: &Gap,
        candidate: &CandidateDocument,
        text: &str,
        missing: &[String],
    ) -> Result<ExtractionAttempt, AgentError> {
        let prompt = build_clarification_prompt(gap.kind, missing, text);
        self.call(gap, candidate, &prompt)
    }

    /// Call the agent, retrying technical failures and unparseable
    /// responses with a fresh call, up to `max_retries` extra attempts.
    fn call(
        &self,
        gap: &Gap,
        candidate: &CandidateDocument,
        prompt: &str,
    ) -> Result<ExtractionAttempt, AgentError> {
        let mut last_error: Option<AgentError> = None;

        for attempt_no in 0..=self.max_retries {
            let raw = match self.agent.extract(self.model, prompt, EXTRACTION_SYSTEM_PROMPT) {
                Ok(response) => response,
                Err(e) if e.is_technical() && attempt_no < self.max_retries => {
                    tracing::warn!(
                        gap_id = %gap.id,
                        document = %candidate.document_ref,
                        attempt = attempt_no + 1,
                        error = %e,
                        "Agent call failed, retrying"
                    );
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let cleaned = sanitize_agent_output(&raw);
            match parse_agent_payload(gap, &cleaned) {
                Ok(parsed) => {
                    let confidence = parsed.confidence_tier();
                    return Ok(ExtractionAttempt {
                        gap_id: gap.id,
                        document_ref: candidate.document_ref.clone(),
                        raw_output: raw,
                        parsed,
                        confidence,
                        validation_errors: Vec::new(),
                    });
                }
                Err(detail) if attempt_no < self.max_retries => {
                    tracing::warn!(
                        gap_id = %gap.id,
                        document = %candidate.document_ref,
                        attempt = attempt_no + 1,
                        error = %detail,
                        "Agent response parse failed, retrying"
                    );
                    last_error = Some(AgentError::MalformedResponse(detail));
                    continue;
                }
                Err(detail) => return Err(AgentError::MalformedResponse(detail)),
            }
        }

        Err(last_error
            .unwrap_or_else(|| AgentError::MalformedResponse("all retry attempts exhausted".into())))
    }
}

fn parse_agent_payload(gap: &Gap, cleaned: &str) -> Result<ParsedFields, String> {
    let block =
        extract_json_block(cleaned).ok_or_else(|| "no JSON object in agent response".to_string())?;
    let value: serde_json::Value =
        serde_json::from_str(&block).map_err(|e| format!("invalid JSON: {e}"))?;
    ParsedFields::from_json(gap.kind, &value).map_err(|e| format!("unexpected field shape: {e}"))
}
