//! Domain types and DTOs
//!
//! These types define the data exchanged with the analysis service and the
//! canonical analysis record surfaced to callers.

pub mod analysis;
pub mod documents;
pub mod jobs;
pub mod subject;

// Re-export commonly used types
pub use analysis::*;
pub use documents::{SourceDocument, SourceDocumentMeta};
pub use jobs::{JobId, JobState, JobStatusReport};
pub use subject::AnalysisSubject;
