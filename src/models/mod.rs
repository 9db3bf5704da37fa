pub mod document;
pub mod enums;
pub mod event;
pub mod gap;
pub mod source;

pub use document::{CandidateDocument, DiscoveryTier, DocumentMeta, DocumentRef};
pub use enums::{
    AgreementStatus, ConfidenceTier, DocumentCategory, EventKind, ExtractionMethod, GapPriority,
    GapStatus, SourceAuthority,
};
pub use event::{FieldValue, TimelineEvent};
pub use gap::{FieldShape, FieldSpec, Gap, GapKind, GapStateError, ResolutionSummary};
pub use source::{AdjudicatedField, SourceRecord};
