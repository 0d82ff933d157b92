//! Source document domain types
//!
//! Candidate inputs the analysis service can run against, and the rule for
//! picking which one a new job should be submitted for.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{AnalysisError, AnalysisResult};

const STORAGE_KEY_KEYS: &[&str] = &["storage_key", "storageKey", "file_key", "fileKey"];
const DISPLAY_NAME_KEYS: &[&str] = &["display_name", "displayName", "file_name", "fileName"];
const MIME_TYPE_KEYS: &[&str] = &["mime_type", "mimeType"];
const DOCUMENT_DATE_KEYS: &[&str] = &["document_date", "documentDate"];
const CREATED_AT_KEYS: &[&str] = &["created_at", "createdAt"];
const CATEGORY_KEYS: &[&str] = &["category", "document_type", "documentType", "type"];

/// Candidate source document listed for a subject.
///
/// Decoding is lenient: each field takes the first of its accepted keys that
/// holds a usable value, and unusable values read as absent.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SourceDocument {
    pub storage_key: Option<String>,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub document_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

impl<'de> Deserialize<'de> for SourceDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        SourceDocument::from_value(&raw)
            .ok_or_else(|| de::Error::custom("source document must be a JSON object"))
    }
}

impl SourceDocument {
    /// Read a document from one listing entry. `None` if the entry is not an
    /// object.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(str::to_string)
        };
        let date = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(date_value));

        Some(Self {
            storage_key: text(STORAGE_KEY_KEYS),
            display_name: text(DISPLAY_NAME_KEYS),
            mime_type: text(MIME_TYPE_KEYS),
            document_date: date(DOCUMENT_DATE_KEYS),
            created_at: date(CREATED_AT_KEYS),
            category: text(CATEGORY_KEYS),
        })
    }

    /// Trimmed storage key, if one is present.
    pub fn storage_key(&self) -> Option<&str> {
        self.storage_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Whether the document's category is one of `categories`.
    ///
    /// An empty category list accepts every document.
    pub fn is_eligible(&self, categories: &[String]) -> bool {
        if categories.is_empty() {
            return true;
        }
        match self.category.as_deref() {
            Some(category) => {
                let category = category.trim().to_lowercase();
                categories.iter().any(|c| *c == category)
            }
            None => false,
        }
    }

    fn recency_key(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (self.document_date, self.created_at)
    }
}

/// Subset of a [`SourceDocument`] surfaced alongside an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDocumentMeta {
    pub storage_key: Option<String>,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub document_date: Option<DateTime<Utc>>,
}

impl From<&SourceDocument> for SourceDocumentMeta {
    fn from(d: &SourceDocument) -> Self {
        Self {
            storage_key: d.storage_key().map(str::to_string),
            display_name: d.display_name.clone(),
            mime_type: d.mime_type.clone(),
            document_date: d.document_date,
        }
    }
}

/// Pick the most recent eligible document.
///
/// Ordered by document date, then creation time, both descending. Undated
/// documents rank below dated ones.
pub fn select_latest_eligible<'a>(
    documents: &'a [SourceDocument],
    categories: &[String],
) -> Option<&'a SourceDocument> {
    documents
        .iter()
        .filter(|d| d.is_eligible(categories))
        .max_by(|a, b| a.recency_key().cmp(&b.recency_key()))
}

/// Decode a document listing array.
///
/// Entries that are not objects are skipped so one bad entry cannot hide the
/// rest of the listing.
pub fn decode_listing(body: Value) -> AnalysisResult<Vec<SourceDocument>> {
    let entries = match body {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        other => {
            return Err(AnalysisError::InvalidResponse(format!(
                "document listing must be an array, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = entries.len();
    let documents: Vec<SourceDocument> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let document = SourceDocument::from_value(entry);
            if document.is_none() {
                warn!(index, kind = json_kind(entry), "Skipping malformed source document entry");
            }
            document
        })
        .collect();

    if documents.len() < total {
        warn!(total, kept = documents.len(), "Document listing had malformed entries");
    }
    Ok(documents)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a date from a string (RFC 3339, naive datetime or `YYYY-MM-DD`) or
/// from epoch milliseconds. Anything else reads as absent.
fn date_value(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => parse_date(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
