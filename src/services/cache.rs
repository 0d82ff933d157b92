//! In-memory analysis cache.
//!
//! Holds one normalized analysis per subject so repeat loads resolve without
//! touching the analysis service. Entries are immutable: a refresh evicts the
//! slot and a later resolution inserts a new entry in its place.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::analysis::NormalizedAnalysis;
use crate::domain::documents::SourceDocumentMeta;
use crate::domain::subject::AnalysisSubject;

/// Cached analysis together with the document it was produced from.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnalysis {
    pub analysis: Arc<NormalizedAnalysis>,
    pub source: Option<SourceDocumentMeta>,
    pub cached_at: DateTime<Utc>,
}

impl CachedAnalysis {
    pub fn new(analysis: NormalizedAnalysis, source: Option<SourceDocumentMeta>) -> Self {
        Self {
            analysis: Arc::new(analysis),
            source,
            cached_at: Utc::now(),
        }
    }
}

/// Analysis cache keyed by subject.
///
/// Clones share the same slots.
#[derive(Clone, Default)]
pub struct AnalysisCache {
    inner: Arc<RwLock<HashMap<String, Arc<CachedAnalysis>>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached entry for `subject`.
    pub fn get(&self, subject: &AnalysisSubject) -> Option<Arc<CachedAnalysis>> {
        let entry = self.inner.read().get(subject.cache_key()).cloned();
        debug!(subject = %subject, cache_hit = entry.is_some(), "Analysis cache lookup");
        entry
    }

    /// Store `entry` for `subject`, replacing any previous entry whole.
    pub fn insert(&self, subject: &AnalysisSubject, entry: CachedAnalysis) -> Arc<CachedAnalysis> {
        let entry = Arc::new(entry);
        self.inner
            .write()
            .insert(subject.cache_key().to_string(), Arc::clone(&entry));
        debug!(subject = %subject, "Cached analysis");
        entry
    }

    /// Drop the entry for `subject`. Returns whether one existed.
    pub fn evict(&self, subject: &AnalysisSubject) -> bool {
        let removed = self.inner.write().remove(subject.cache_key()).is_some();
        debug!(subject = %subject, removed, "Analysis cache evict");
        removed
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
