//! Analysis session controller
//!
//! An [`AnalysisSession`] owns the retrieval lifecycle for whichever subject
//! a caller last asked for: cache lookup, the existing-analysis/document
//! fan-out, job submission and the polling loop. Progress is exposed as a
//! single observable [`SessionState`].
//!
//! Every load takes a new generation. State and cache writes are applied only
//! while their generation is still current, so a newer `load`, a `refresh`
//! or a `cancel` silently retires whatever flow was in flight.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, info, instrument, warn};

use crate::domain::analysis::NormalizedAnalysis;
use crate::domain::documents::{select_latest_eligible, SourceDocumentMeta};
use crate::domain::jobs::{JobId, JobState};
use crate::domain::subject::AnalysisSubject;
use crate::error::AnalysisResult;
use crate::services::backend::AnalysisBackend;
use crate::services::cache::{AnalysisCache, CachedAnalysis};

/// Surfaced when a job outlives the polling window.
pub const TIMEOUT_MESSAGE: &str =
    "Analysis is taking longer than expected. Please try again in a few minutes.";

/// Surfaced when a failed job carries no message of its own.
pub const JOB_FAILED_MESSAGE: &str = "Analysis failed";

/// Surfaced when a completed job yields no analysis.
pub const NO_RESULT_MESSAGE: &str = "Analysis finished without a result";

/// Notice attached to `Empty` when the selected document cannot be submitted.
pub const NO_FILE_KEY_NOTICE: &str = "Report has no file key";

/// Session tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Delay between job status polls.
    pub poll_interval: Duration,
    /// Time allowed from job submission to a terminal job state.
    pub poll_timeout: Duration,
    /// Lowercase source document categories eligible for analysis.
    pub eligible_categories: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2500),
            poll_timeout: Duration::from_secs(60),
            eligible_categories: vec!["inspection".to_string(), "inspection_report".to_string()],
        }
    }
}

/// Session status without its payload
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Empty,
    Loading,
    Ready,
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Empty => write!(f, "empty"),
            SessionStatus::Loading => write!(f, "loading"),
            SessionStatus::Ready => write!(f, "ready"),
            SessionStatus::Error => write!(f, "error"),
        }
    }
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing requested yet.
    Idle,
    /// Nothing to analyze. `notice` explains a degraded case such as a
    /// document without a storage key.
    Empty {
        notice: Option<String>,
        source: Option<SourceDocumentMeta>,
    },
    /// Request in flight. Job fields are filled in once a job is polled.
    Loading {
        job_id: Option<JobId>,
        progress: Option<String>,
    },
    Ready {
        data: Arc<NormalizedAnalysis>,
        source: Option<SourceDocumentMeta>,
    },
    Error {
        message: String,
    },
}

impl SessionState {
    fn ready(entry: &CachedAnalysis) -> Self {
        Self::Ready {
            data: Arc::clone(&entry.analysis),
            source: entry.source.clone(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Idle => SessionStatus::Idle,
            Self::Empty { .. } => SessionStatus::Empty,
            Self::Loading { .. } => SessionStatus::Loading,
            Self::Ready { .. } => SessionStatus::Ready,
            Self::Error { .. } => SessionStatus::Error,
        }
    }

    pub fn data(&self) -> Option<&NormalizedAnalysis> {
        match self {
            Self::Ready { data, .. } => Some(data.as_ref()),
            _ => None,
        }
    }

    /// Failure message, or the notice explaining a degraded `Empty`.
    ///
    /// `status()` tells the two apart.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message.as_str()),
            Self::Empty { notice, .. } => notice.as_deref(),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&SourceDocumentMeta> {
        match self {
            Self::Empty { source, .. } | Self::Ready { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    /// Whether no further automatic activity follows this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Empty { .. } | Self::Ready { .. } | Self::Error { .. })
    }
}

/// Generation bookkeeping. `live` is false once `cancel` retired the last flow
/// without starting another.
#[derive(Debug, Clone, Copy, Default)]
struct Generation {
    id: u64,
    live: bool,
}

/// How a flow ended, before it is applied to the session.
enum Outcome {
    Empty {
        notice: Option<String>,
        source: Option<SourceDocumentMeta>,
    },
    Ready(CachedAnalysis),
    Failed(String),
}

/// Analysis session controller.
///
/// Clones share state, cache and generation.
#[derive(Clone)]
pub struct AnalysisSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    backend: Arc<dyn AnalysisBackend>,
    cache: AnalysisCache,
    config: SessionConfig,
    generation: watch::Sender<Generation>,
    state: watch::Sender<SessionState>,
}

impl AnalysisSession {
    /// Create a session with its own private cache.
    pub fn new(backend: Arc<dyn AnalysisBackend>, config: SessionConfig) -> Self {
        Self::with_cache(backend, AnalysisCache::new(), config)
    }

    /// Create a session over a cache that may be shared with other sessions.
    pub fn with_cache(
        backend: Arc<dyn AnalysisBackend>,
        cache: AnalysisCache,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (generation, _) = watch::channel(Generation::default());
        Self {
            inner: Arc::new(SessionInner {
                backend,
                cache,
                config,
                generation,
                state,
            }),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.inner.cache
    }

    /// Retire the in-flight flow, if any. Its state is left as is.
    pub fn cancel(&self) {
        let generation = self.advance(false);
        debug!(generation, "Analysis session cancelled");
    }

    /// Load the analysis for `subject`.
    ///
    /// Resolves with a terminal state: this flow's own, or, if a newer
    /// `load`/`refresh` superseded it, the state that newer flow settles in.
    /// A flow retired by `cancel` resolves with the state left in place.
    pub async fn load(&self, subject: Option<AnalysisSubject>) -> SessionState {
        let generation = self.begin();
        self.run(generation, subject).await
    }

    /// Evict `subject` from the cache and load it again.
    pub async fn refresh(&self, subject: Option<AnalysisSubject>) -> SessionState {
        let generation = self.begin();
        if let Some(subject) = subject.as_ref().filter(|s| !s.is_blank()) {
            self.inner.cache.evict(subject);
        }
        self.run(generation, subject).await
    }

    #[instrument(skip(self, subject), fields(subject))]
    async fn run(&self, generation: u64, subject: Option<AnalysisSubject>) -> SessionState {
        let Some(subject) = subject.filter(|s| !s.is_blank()) else {
            debug!("No subject to analyze");
            self.publish(
                generation,
                SessionState::Empty {
                    notice: None,
                    source: None,
                },
            );
            return self.state();
        };
        tracing::Span::current().record("subject", subject.as_str());

        if let Some(entry) = self.inner.cache.get(&subject) {
            self.publish(generation, SessionState::ready(&entry));
            return self.state();
        }

        self.publish(
            generation,
            SessionState::Loading {
                job_id: None,
                progress: None,
            },
        );

        match self.resolve(&subject, generation).await {
            Ok(Some(outcome)) => self.settle(generation, &subject, outcome),
            Ok(None) => debug!("Superseded analysis flow halted"),
            Err(e) => {
                if self.is_current(generation) {
                    let message = e.report();
                    self.settle(generation, &subject, Outcome::Failed(message));
                }
            }
        }

        if self.is_current(generation) {
            self.state()
        } else {
            self.settled_state().await
        }
    }

    /// Wait until the session rests: a terminal state, or no live flow left
    /// after a `cancel`.
    async fn settled_state(&self) -> SessionState {
        let mut states = self.inner.state.subscribe();
        let mut generations = self.inner.generation.subscribe();

        loop {
            {
                let state = states.borrow_and_update();
                if state.is_terminal() || !generations.borrow_and_update().live {
                    return state.clone();
                }
            }
            tokio::select! {
                _ = states.changed() => {}
                _ = generations.changed() => {}
            }
        }
    }

    /// Fan out, pick the source document, then reuse or compute an analysis.
    ///
    /// `Ok(None)` means the flow was superseded.
    async fn resolve(
        &self,
        subject: &AnalysisSubject,
        generation: u64,
    ) -> AnalysisResult<Option<Outcome>> {
        let backend = &self.inner.backend;

        let (existing, documents) = futures::join!(
            backend.fetch_existing(subject),
            backend.list_documents(subject)
        );
        if !self.is_current(generation) {
            return Ok(None);
        }

        let existing = existing.unwrap_or_else(|e| {
            if e.is_transport() {
                warn!(error = %e, "Analysis service unreachable for existing analysis, continuing without it");
            } else {
                warn!(error = %e, "Existing analysis lookup failed, continuing without it");
            }
            None
        });
        let documents = documents.unwrap_or_else(|e| {
            warn!(error = %e, "Source document listing failed, treating as empty");
            Vec::new()
        });

        let Some(document) = select_latest_eligible(&documents, &self.inner.config.eligible_categories)
        else {
            info!(candidates = documents.len(), "No eligible source document");
            return Ok(Some(Outcome::Empty {
                notice: None,
                source: None,
            }));
        };
        let source = SourceDocumentMeta::from(document);

        if document.storage_key().is_none() {
            warn!(document = ?document.display_name, "Selected source document has no storage key");
            return Ok(Some(Outcome::Empty {
                notice: Some(NO_FILE_KEY_NOTICE.to_string()),
                source: Some(source),
            }));
        }

        if let Some(analysis) = existing {
            debug!("Using existing analysis");
            return Ok(Some(Outcome::Ready(CachedAnalysis::new(analysis, Some(source)))));
        }

        let job_id = backend.submit_job(subject, document).await?;
        info!(job_id = %job_id, "Analysis job submitted, polling");

        self.poll_until_settled(subject, job_id, source, generation)
            .await
    }

    /// Poll `job_id` until it settles, the window closes, or the flow is
    /// superseded.
    async fn poll_until_settled(
        &self,
        subject: &AnalysisSubject,
        job_id: JobId,
        source: SourceDocumentMeta,
        generation: u64,
    ) -> AnalysisResult<Option<Outcome>> {
        let config = &self.inner.config;
        let deadline = Instant::now() + config.poll_timeout;

        loop {
            if !self.is_current(generation) {
                return Ok(None);
            }
            if Instant::now() >= deadline {
                warn!(job_id = %job_id, "Analysis job timed out");
                return Ok(Some(Outcome::Failed(TIMEOUT_MESSAGE.to_string())));
            }

            let report = match time::timeout_at(deadline, self.inner.backend.poll_job(&job_id)).await {
                Ok(report) => report?,
                Err(_) => {
                    warn!(job_id = %job_id, "Analysis job poll outlived the polling window");
                    return Ok(Some(Outcome::Failed(TIMEOUT_MESSAGE.to_string())));
                }
            };

            // A result that arrives after supersession is dropped unseen
            if !self.is_current(generation) {
                return Ok(None);
            }

            if report.status.is_terminal() {
                let outcome = match report.status {
                    JobState::Completed => self.completed(subject, report.result, source).await,
                    _ => Outcome::Failed(
                        report
                            .error_message
                            .unwrap_or_else(|| JOB_FAILED_MESSAGE.to_string()),
                    ),
                };
                return Ok(Some(outcome));
            }

            self.publish(
                generation,
                SessionState::Loading {
                    job_id: Some(job_id.clone()),
                    progress: report.progress,
                },
            );

            if !self.is_current(generation) {
                return Ok(None);
            }
            let next_poll = (Instant::now() + config.poll_interval).min(deadline);
            time::sleep_until(next_poll).await;
        }
    }

    /// Outcome of a completed job. A job that embeds no result gets one
    /// `fetch_existing` before the session gives up on it.
    async fn completed(
        &self,
        subject: &AnalysisSubject,
        result: Option<NormalizedAnalysis>,
        source: SourceDocumentMeta,
    ) -> Outcome {
        let analysis = match result {
            Some(analysis) => Some(analysis),
            None => self
                .inner
                .backend
                .fetch_existing(subject)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Fetching completed analysis failed");
                    None
                }),
        };

        match analysis {
            Some(analysis) => Outcome::Ready(CachedAnalysis::new(analysis, Some(source))),
            None => Outcome::Failed(NO_RESULT_MESSAGE.to_string()),
        }
    }

    // ========================================================================
    // Generation bookkeeping
    // ========================================================================

    fn begin(&self) -> u64 {
        self.advance(true)
    }

    /// Retire the current flow and return the next generation id.
    fn advance(&self, live: bool) -> u64 {
        let mut id = 0;
        self.inner.generation.send_modify(|g| {
            g.id += 1;
            g.live = live;
            id = g.id;
        });
        id
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.borrow().id == generation
    }

    /// Apply `state` if `generation` is still current.
    fn publish(&self, generation: u64, state: SessionState) -> bool {
        let current = self.inner.generation.borrow();
        if current.id != generation {
            return false;
        }
        self.inner.state.send_if_modified(|s| {
            if *s == state {
                false
            } else {
                *s = state;
                true
            }
        });
        true
    }

    /// Apply a terminal outcome, writing the cache first for `Ready`.
    fn settle(&self, generation: u64, subject: &AnalysisSubject, outcome: Outcome) {
        let current = self.inner.generation.borrow();
        if current.id != generation {
            debug!("Dropping outcome of superseded flow");
            return;
        }

        let state = match outcome {
            Outcome::Ready(entry) => {
                let entry = self.inner.cache.insert(subject, entry);
                info!("Analysis ready");
                SessionState::ready(&entry)
            }
            Outcome::Empty { notice, source } => {
                info!(notice = ?notice, "Nothing to analyze");
                SessionState::Empty { notice, source }
            }
            Outcome::Failed(message) => {
                warn!(message = %message, "Analysis load failed");
                SessionState::Error { message }
            }
        };

        self.inner.state.send_replace(state);
    }
}
