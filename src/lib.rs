//! Anamnesis — clinical-history timeline abstraction.
//!
//! Combines a tabular clinical warehouse with free-text source documents
//! interpreted by a medical text-extraction agent. The core subsystem is the
//! gap-directed multi-source extraction pipeline: detect missing event
//! fields, discover candidate documents through tiered fallback search,
//! drive the agent through validate/clarify/escalate, and adjudicate
//! multi-source values with a documented rationale.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod timeline;

pub use models::{
    AdjudicatedField, CandidateDocument, DiscoveryTier, DocumentCategory, DocumentRef, EventKind,
    FieldValue, Gap, GapKind, GapPriority, GapStatus, SourceAuthority, SourceRecord, TimelineEvent,
};
pub use pipeline::{
    DocumentStore, EquivalenceTables, ExtractionAgent, GapResolver, ResolutionConfig,
    ResolutionError, RunReport,
};
pub use timeline::{Timeline, TimelineIntegrator};
