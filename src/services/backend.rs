//! Analysis backend abstraction
//!
//! The session controller only ever talks to the analysis service through
//! [`AnalysisBackend`]. [`AnalysisClient`](super::AnalysisClient) is the
//! HTTP implementation; hosts with their own transport implement it directly.

use async_trait::async_trait;

use crate::domain::analysis::NormalizedAnalysis;
use crate::domain::documents::SourceDocument;
use crate::domain::jobs::{JobId, JobStatusReport};
use crate::domain::subject::AnalysisSubject;
use crate::error::AnalysisResult;

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Fetch the stored analysis for `subject`.
    ///
    /// Returns `Ok(None)` when none exists yet.
    async fn fetch_existing(
        &self,
        subject: &AnalysisSubject,
    ) -> AnalysisResult<Option<NormalizedAnalysis>>;

    /// List candidate source documents for `subject`.
    async fn list_documents(&self, subject: &AnalysisSubject) -> AnalysisResult<Vec<SourceDocument>>;

    /// Start or refresh an analysis job for `document`.
    ///
    /// Fails with [`MissingStorageKey`](crate::error::AnalysisError::MissingStorageKey)
    /// before any request when the document has no storage key. Repeated calls
    /// may start new jobs.
    async fn submit_job(
        &self,
        subject: &AnalysisSubject,
        document: &SourceDocument,
    ) -> AnalysisResult<JobId>;

    /// Read a job's status once.
    async fn poll_job(&self, job_id: &JobId) -> AnalysisResult<JobStatusReport>;
}
