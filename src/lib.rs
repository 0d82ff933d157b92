//! Asynchronous analysis retrieval client.
//!
//! Fetches, caches and polls for a long-running, externally computed
//! analysis of a subject's most recent source document, and normalizes every
//! wire shape the analysis service emits into one [`NormalizedAnalysis`].
//!
//! The entry point is [`AnalysisSession`]: call [`load`](AnalysisSession::load)
//! or [`refresh`](AnalysisSession::refresh) and observe [`SessionState`].

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod services;

pub use domain::analysis::NormalizedAnalysis;
pub use domain::subject::AnalysisSubject;
pub use error::{AnalysisError, AnalysisResult};
pub use normalize::{normalize, NormalizeError};
pub use services::{
    AnalysisBackend, AnalysisCache, AnalysisClient, AnalysisSession, SessionConfig, SessionState,
    SessionStatus,
};
