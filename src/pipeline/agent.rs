//! HTTP extraction-agent client for a local Ollama-compatible endpoint.

use serde::{Deserialize, Serialize};

use super::error::AgentError;
use super::traits::ExtractionAgent;

/// Preferred extraction models in order of preference.
const PREFERRED_MODELS: &[&str] = &[
    "medgemma",
    "medgemma:27b",
    "medgemma:4b",
    "medgemma:latest",
];

/// Blocking HTTP client for the extraction agent.
pub struct HttpExtractionAgent {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpExtractionAgent {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Default local instance with a 5-minute timeout.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", 300)
    }

    /// Find the best available extraction model.
    pub fn find_best_model(&self) -> Result<String, AgentError> {
        let available = self.list_models()?;
        for preferred in PREFERRED_MODELS {
            if available.iter().any(|m| m.starts_with(preferred)) {
                return Ok(preferred.to_string());
            }
        }
        Err(AgentError::NoModelAvailable)
    }

    pub fn list_models(&self) -> Result<Vec<String>, AgentError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                AgentError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                AgentError::Timeout(self.timeout_secs)
            } else {
                AgentError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AgentError::Http { status: status.as_u16(), body });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Request body for /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response body from /api/tags
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

impl ExtractionAgent for HttpExtractionAgent {
    fn extract(&self, model: &str, prompt: &str, system: &str) -> Result<String, AgentError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest { model, prompt, system, stream: false };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                AgentError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                AgentError::Timeout(self.timeout_secs)
            } else {
                AgentError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AgentError::Http { status: status.as_u16(), body });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    fn health_check(&self) -> Result<(), AgentError> {
        self.list_models().map(|_| ())
    }
}
