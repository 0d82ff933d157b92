//! Analysis service client.
//!
//! Provides the HTTP implementation of [`AnalysisBackend`]:
//! - Existing analysis lookup
//! - Source document listing
//! - Analysis job submission
//! - Job status polling
//!
//! Every analysis payload is normalized before it leaves this module.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::domain::analysis::NormalizedAnalysis;
use crate::domain::documents::{decode_listing, SourceDocument};
use crate::domain::jobs::{JobId, JobStatusReport, SubmitJobRequest, SubmitJobResponse};
use crate::domain::subject::AnalysisSubject;
use crate::error::{AnalysisError, AnalysisResult};
use crate::normalize::normalize;
use crate::services::backend::AnalysisBackend;

/// Client for the analysis service.
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: Url,
    token: String,
}

/// Error response from the analysis service.
#[derive(Debug, Deserialize)]
struct ServiceErrorResponse {
    #[allow(dead_code)]
    code: Option<String>,
    message: String,
    #[allow(dead_code)]
    request_id: Option<String>,
}

impl AnalysisClient {
    /// Create a new analysis service client.
    pub fn new(base_url: &str, token: &str, timeout_seconds: u64) -> Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid analysis service URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Analysis service URL cannot carry a path: {}", base_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = %base_url, "Analysis client initialized");

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    /// Build an endpoint URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> AnalysisResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AnalysisError::Internal(anyhow::anyhow!("Analysis service URL cannot be a base"))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the decoded JSON body.
    ///
    /// An empty success body decodes to `Value::Null`.
    async fn execute(&self, req: RequestBuilder) -> AnalysisResult<Value> {
        let request_id = Uuid::new_v4().to_string();

        let response = req
            .header("X-Internal-Token", &self.token)
            .header("x-request-id", &request_id)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, request_id = %request_id, "Analysis service request failed");
                AnalysisError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        debug!(status = %status, request_id = %request_id, "Analysis service response");

        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| AnalysisError::Unavailable(e.to_string()))?;

            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }

            serde_json::from_slice(&body).map_err(|e| {
                error!(error = %e, "Failed to parse analysis service response");
                AnalysisError::InvalidResponse(e.to_string())
            })
        } else {
            let error_body = response.json::<ServiceErrorResponse>().await.ok();

            let message = error_body
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| format!("Analysis service error: {}", status));

            match status {
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(AnalysisError::BadRequest(message))
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    error!("Analysis service authentication failed");
                    Err(AnalysisError::Unauthorized(message))
                }
                StatusCode::NOT_FOUND => Err(AnalysisError::NotFound(message)),
                _ => {
                    error!(status = %status, message = %message, "Analysis service error");
                    Err(AnalysisError::Unavailable(message))
                }
            }
        }
    }

    /// Check analysis service health.
    pub async fn health_check(&self) -> Result<()> {
        let url = self.endpoint(&["health"])?;

        self.client
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Analysis service health check failed")?
            .error_for_status()
            .context("Analysis service unhealthy")?;

        Ok(())
    }
}

/// Responses are either bare or wrapped as `{"<key>": ...}`.
fn unwrap_envelope(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut obj) if obj.contains_key(key) => obj.remove(key).unwrap_or(Value::Null),
        other => other,
    }
}

#[async_trait]
impl AnalysisBackend for AnalysisClient {
    #[instrument(skip(self, subject), fields(subject = %subject))]
    async fn fetch_existing(
        &self,
        subject: &AnalysisSubject,
    ) -> AnalysisResult<Option<NormalizedAnalysis>> {
        let url = self.endpoint(&["v1", "subjects", subject.as_str(), "analysis"])?;

        let body = match self.execute(self.client.get(url)).await {
            Ok(body) => body,
            Err(AnalysisError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match unwrap_envelope(body, "analysis") {
            Value::Null => Ok(None),
            raw => Ok(Some(normalize(&raw)?)),
        }
    }

    #[instrument(skip(self, subject), fields(subject = %subject))]
    async fn list_documents(&self, subject: &AnalysisSubject) -> AnalysisResult<Vec<SourceDocument>> {
        let url = self.endpoint(&["v1", "subjects", subject.as_str(), "documents"])?;
        let body = self.execute(self.client.get(url)).await?;

        decode_listing(unwrap_envelope(body, "documents"))
    }

    #[instrument(skip(self, subject, document), fields(subject = %subject))]
    async fn submit_job(
        &self,
        subject: &AnalysisSubject,
        document: &SourceDocument,
    ) -> AnalysisResult<JobId> {
        let request = SubmitJobRequest::for_document(document)?;
        let url = self.endpoint(&["v1", "subjects", subject.as_str(), "analysis", "jobs"])?;

        let body = self.execute(self.client.post(url).json(&request)).await?;
        let response: SubmitJobResponse = serde_json::from_value(body)
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        info!(job_id = %response.job_id, storage_key = %request.storage_key, "Analysis job submitted");
        Ok(response.job_id)
    }

    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    async fn poll_job(&self, job_id: &JobId) -> AnalysisResult<JobStatusReport> {
        let url = self.endpoint(&["v1", "analysis", "jobs", job_id.as_str()])?;
        let body = self.execute(self.client.get(url)).await?;

        let report = JobStatusReport::from_value(body)?;
        debug!(status = %report.status, progress = ?report.progress, "Analysis job polled");
        Ok(report)
    }
}
