//! Unified analysis error handling
//!
//! Every failure the repository client or the normalizer can produce is
//! expressed as an [`AnalysisError`]. The session controller turns these into
//! observable states and never lets one escape to its caller.

use thiserror::Error;

use crate::normalize::NormalizeError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid analysis service response: {0}")]
    InvalidResponse(String),

    #[error("Report has no file key")]
    MissingStorageKey,

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AnalysisError {
    /// Whether the failure happened on the wire rather than in the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Unauthorized(_))
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::MissingStorageKey => "MISSING_STORAGE_KEY",
            Self::Normalize(_) => "MALFORMED_PAYLOAD",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Log the error at a level matching its kind and return the message that
    /// is safe to surface in a session state.
    pub(crate) fn report(&self) -> String {
        match self {
            Self::Internal(e) => {
                tracing::error!(code = self.error_code(), error = ?e, "Internal analysis error");
            }
            _ => {
                tracing::warn!(code = self.error_code(), error = %self, "Analysis error");
            }
        }
        self.to_string()
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
