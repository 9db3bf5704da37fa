//! Error taxonomy for the gap-resolution pipeline.
//!
//! Per-gap failures (discovery exhausted, inadmissible document, incomplete
//! extraction) are recorded on the gap outcome and recovered locally — they
//! are NOT errors here. The enums below cover the technical layer (agent,
//! store) and the only fatal condition: total unavailability at start-up.

use thiserror::Error;

use crate::models::DocumentRef;

/// Technical failures of the extraction agent. Distinguishable from
/// validation failures (the agent responded but content was inadequate).
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("extraction agent is not reachable at {0}")]
    Connection(String),

    #[error("extraction agent request timed out after {0}s")]
    Timeout(u64),

    #[error("extraction agent returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("malformed agent response: {0}")]
    MalformedResponse(String),

    #[error("no compatible extraction model available")]
    NoModelAvailable,
}

impl AgentError {
    /// Transport-level failures are worth a fresh call; a malformed response
    /// is retried at the parse layer instead.
    pub fn is_technical(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Http { .. }
        )
    }
}

/// Technical failures of the candidate document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document store is unavailable: {0}")]
    Unavailable(String),

    #[error("document store query failed: {0}")]
    Query(String),

    #[error("document {0} has no retrievable text")]
    MissingText(DocumentRef),
}

/// Fatal pipeline errors. Everything else is recovered per gap.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("extraction agent unavailable at start-up: {0}")]
    AgentUnavailable(#[source] AgentError),

    #[error("document store unavailable at start-up: {0}")]
    StoreUnavailable(#[source] StoreError),
}

/// Adjudication refuses to produce a value from zero evidence.
#[derive(Error, Debug)]
pub enum AdjudicationError {
    #[error("cannot adjudicate '{0}' from zero source records")]
    NoSources(String),
}
