//! Analysis subject identifiers

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Opaque id of the parent entity an analysis belongs to.
///
/// Hosts hand out either string or numeric ids; both collapse to the same
/// textual form, which doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AnalysisSubject(String);

impl AnalysisSubject {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this subject's analysis is cached.
    pub fn cache_key(&self) -> &str {
        &self.0
    }

    /// Blank ids are treated the same as an absent subject.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for AnalysisSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnalysisSubject {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AnalysisSubject {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for AnalysisSubject {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for AnalysisSubject {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for AnalysisSubject {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for AnalysisSubject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}
