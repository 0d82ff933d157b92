//! Scripted in-memory analysis backend for session tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use inspection_analysis::domain::documents::SourceDocument;
use inspection_analysis::domain::jobs::{JobId, JobStatusReport, SubmitJobRequest};
use inspection_analysis::{normalize, AnalysisBackend, AnalysisError, AnalysisResult, AnalysisSubject, NormalizedAnalysis};

#[derive(Default)]
pub struct FakeBackend {
    existing: Option<Value>,
    existing_after_submit: Option<Value>,
    existing_fails: bool,
    documents: Vec<SourceDocument>,
    documents_fail: bool,
    submit_error: Option<String>,
    polls: Mutex<VecDeque<Value>>,

    pub fetch_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub submitted: Mutex<Vec<SourceDocument>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(mut self, raw: Value) -> Self {
        self.existing = Some(raw);
        self
    }

    pub fn with_existing_after_submit(mut self, raw: Value) -> Self {
        self.existing_after_submit = Some(raw);
        self
    }

    pub fn failing_existing(mut self) -> Self {
        self.existing_fails = true;
        self
    }

    pub fn with_documents(mut self, documents: Vec<SourceDocument>) -> Self {
        self.documents = documents;
        self
    }

    pub fn failing_documents(mut self) -> Self {
        self.documents_fail = true;
        self
    }

    pub fn failing_submit(mut self, message: &str) -> Self {
        self.submit_error = Some(message.to_string());
        self
    }

    /// Status bodies returned in order; the last one repeats.
    pub fn with_polls(self, polls: Vec<Value>) -> Self {
        *self.polls.lock() = polls.into();
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.fetches() + self.list_calls.load(Ordering::SeqCst) + self.submits() + self.polls()
    }
}

#[async_trait]
impl AnalysisBackend for FakeBackend {
    async fn fetch_existing(
        &self,
        _subject: &AnalysisSubject,
    ) -> AnalysisResult<Option<NormalizedAnalysis>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.existing_fails {
            return Err(AnalysisError::Unavailable("connection refused".to_string()));
        }

        let raw = if self.submits() > 0 {
            self.existing_after_submit.as_ref()
        } else {
            self.existing.as_ref()
        };
        Ok(raw.map(normalize).transpose()?)
    }

    async fn list_documents(&self, _subject: &AnalysisSubject) -> AnalysisResult<Vec<SourceDocument>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.documents_fail {
            return Err(AnalysisError::Unavailable("connection reset".to_string()));
        }
        Ok(self.documents.clone())
    }

    async fn submit_job(
        &self,
        _subject: &AnalysisSubject,
        document: &SourceDocument,
    ) -> AnalysisResult<JobId> {
        SubmitJobRequest::for_document(document)?;
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = &self.submit_error {
            return Err(AnalysisError::Unavailable(message.clone()));
        }
        self.submitted.lock().push(document.clone());
        Ok(JobId::new(format!("job-{n}")))
    }

    async fn poll_job(&self, _job_id: &JobId) -> AnalysisResult<JobStatusReport> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let body = {
            let mut polls = self.polls.lock();
            if polls.len() > 1 {
                polls.pop_front()
            } else {
                polls.front().cloned()
            }
        }
        .unwrap_or_else(|| json!({ "status": "processing" }));
        JobStatusReport::from_value(body)
    }
}

pub fn report(storage_key: &str, date: &str) -> SourceDocument {
    serde_json::from_value(json!({
        "storageKey": storage_key,
        "displayName": format!("{date} inspection.pdf"),
        "mimeType": "application/pdf",
        "documentDate": date,
        "category": "inspection"
    }))
    .expect("valid document")
}

pub fn analysis_payload(summary: &str) -> Value {
    json!({
        "summary": summary,
        "overall_condition": "good",
        "confidence": 0.9,
        "risks": [{ "title": "Aging water heater", "severity": "medium", "page_refs": [3] }],
        "recommended_actions": [{ "title": "Flush water heater", "priority": "low" }]
    })
}
