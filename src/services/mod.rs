//! Service layer modules for analysis retrieval.
//!
//! Contains the backend seam, its HTTP client, the in-memory analysis cache
//! and the session controller that ties them together.

pub mod analysis_client;
pub mod backend;
pub mod cache;
pub mod session;

pub use analysis_client::AnalysisClient;
pub use backend::AnalysisBackend;
pub use cache::{AnalysisCache, CachedAnalysis};
pub use session::{AnalysisSession, SessionConfig, SessionState, SessionStatus};
