//! Analysis job domain types
//!
//! Types for submitting analysis jobs and reading back their status.

use serde::{Deserialize, Serialize};

use crate::domain::analysis::NormalizedAnalysis;
use crate::domain::documents::SourceDocument;
use crate::error::{AnalysisError, AnalysisResult};
use crate::normalize::normalize;

/// Analysis job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[serde(alias = "pending")]
    Queued,
    #[serde(alias = "running")]
    Processing,
    #[serde(alias = "succeeded")]
    Completed,
    #[serde(alias = "cancelled", alias = "error")]
    Failed,
}

impl JobState {
    /// Whether polling stops at this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Server-side job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of a start-or-refresh request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubmitJobRequest {
    pub storage_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl SubmitJobRequest {
    /// Build the request for `document`, refusing documents without a storage key.
    pub fn for_document(document: &SourceDocument) -> AnalysisResult<Self> {
        let storage_key = document
            .storage_key()
            .ok_or(AnalysisError::MissingStorageKey)?;

        Ok(Self {
            storage_key: storage_key.to_string(),
            file_name: document.display_name.clone(),
            mime_type: document.mime_type.clone(),
        })
    }
}

/// Response to a start-or-refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobResponse {
    #[serde(alias = "jobId", alias = "id")]
    pub job_id: JobId,
}

/// Job status exactly as the service sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusWire {
    pub status: JobState,
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
    #[serde(default, alias = "errorMessage", alias = "error")]
    pub error_message: Option<String>,
    #[serde(default, alias = "output")]
    pub result: Option<serde_json::Value>,
}

/// Result of a single poll, with any embedded result already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusReport {
    pub status: JobState,
    pub progress: Option<String>,
    pub error_message: Option<String>,
    pub result: Option<NormalizedAnalysis>,
}

impl JobStatusReport {
    /// Normalize a wire status. A non-object `result` fails the whole report.
    pub fn from_wire(wire: JobStatusWire) -> AnalysisResult<Self> {
        let result = match wire.result {
            None | Some(serde_json::Value::Null) => None,
            Some(raw) => Some(normalize(&raw)?),
        };

        Ok(Self {
            status: wire.status,
            progress: wire.progress.as_ref().and_then(progress_text),
            error_message: wire
                .error_message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            result,
        })
    }

    /// Parse and normalize a raw JSON status body.
    pub fn from_value(raw: serde_json::Value) -> AnalysisResult<Self> {
        let wire: JobStatusWire = serde_json::from_value(raw)
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;
        Self::from_wire(wire)
    }
}

/// Progress arrives as either a message or a fraction.
fn progress_text(raw: &serde_json::Value) -> Option<String> {
    match raw {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => n.as_f64().map(|p| {
            let pct = if p <= 1.0 { p * 100.0 } else { p };
            format!("{:.0}%", pct.clamp(0.0, 100.0))
        }),
        _ => None,
    }
}
