//! Analysis payload normalization
//!
//! The analysis service has emitted two payload shapes over time:
//!
//! - **canonical**: `summary`, `overall_condition`/`property_state`, `risks`,
//!   `recommended_actions`, `citations`, `metadata`
//! - **legacy**: a flat record built around `condition`, `needs_attention`
//!   and `maintenance_suggestions`
//!
//! [`normalize`] reduces either one to a [`NormalizedAnalysis`]. Which wire
//! keys feed which output field lives in [`RESOLUTION_TABLE`]; canonical
//! paths are always tried before legacy ones. Keys match in snake_case or
//! camelCase.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::analysis::{
    AnalysisMetadata, Citation, Condition, DetectedSystem, MissingSystem, NormalizedAnalysis,
    Priority, RecommendedAction, RiskItem, Severity,
};

/// Longest summary kept, in characters.
pub const SUMMARY_MAX_CHARS: usize = 600;

/// Fallback for top-level confidence.
pub const DEFAULT_CONFIDENCE: f64 = 0.0;

/// Fallback for per-system confidence.
pub const DEFAULT_SYSTEM_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Analysis payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Output fields fed by the resolution table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Summary,
    OverallCondition,
    Confidence,
    SystemsDetected,
    SystemsMissing,
    RecommendedActions,
    Risks,
    Citations,
    Metadata,
}

/// Where a field's value may come from, in order of preference.
///
/// Paths are dot-separated; the empty path names the payload root.
#[derive(Debug)]
pub struct FieldRule {
    pub field: Field,
    pub canonical: &'static [&'static str],
    pub legacy: &'static [&'static str],
}

pub const RESOLUTION_TABLE: &[FieldRule] = &[
    FieldRule {
        field: Field::Summary,
        canonical: &["summary", "property_state.summary"],
        legacy: &["condition.summary", "overview", "executive_summary"],
    },
    FieldRule {
        field: Field::OverallCondition,
        canonical: &["overall_condition", "property_state.overall_condition"],
        legacy: &["condition.rating", "condition", "condition_rating"],
    },
    FieldRule {
        field: Field::Confidence,
        canonical: &["confidence", "property_state.confidence"],
        legacy: &["condition.confidence", "confidence_score"],
    },
    FieldRule {
        field: Field::SystemsDetected,
        canonical: &["systems_detected", "property_state.systems_detected"],
        legacy: &["systems", "condition.systems"],
    },
    FieldRule {
        field: Field::SystemsMissing,
        canonical: &["systems_missing", "property_state.systems_missing"],
        legacy: &["missing_systems"],
    },
    FieldRule {
        field: Field::RecommendedActions,
        canonical: &["recommended_actions"],
        legacy: &["maintenance_suggestions", "maintenance_suggestion"],
    },
    FieldRule {
        field: Field::Risks,
        canonical: &["risks"],
        legacy: &["needs_attention"],
    },
    FieldRule {
        field: Field::Citations,
        canonical: &["citations"],
        legacy: &["sources", "references"],
    },
    FieldRule {
        field: Field::Metadata,
        canonical: &["metadata"],
        legacy: &[""],
    },
];

/// A field value together with the shape it was found in.
#[derive(Debug, Clone, Copy)]
enum Resolved<'a> {
    Canonical(&'a Value),
    Legacy(&'a Value),
    Missing,
}

impl<'a> Resolved<'a> {
    fn value(self) -> Option<&'a Value> {
        match self {
            Resolved::Canonical(v) | Resolved::Legacy(v) => Some(v),
            Resolved::Missing => None,
        }
    }
}

// Per-item key fallbacks, shared by both shapes.
const NAME_KEYS: &[&str] = &["name", "system", "title"];
const TITLE_KEYS: &[&str] = &["title", "action", "name", "risk"];
const LEGACY_SUGGESTION_TITLE_KEYS: &[&str] = &["suggestion", "title", "action", "item"];
const LEGACY_ATTENTION_TITLE_KEYS: &[&str] = &["item", "issue", "title"];
const CONDITION_KEYS: &[&str] = &["condition", "status", "rating"];
const RATIONALE_KEYS: &[&str] = &["rationale", "reason", "description", "details"];
const EVIDENCE_KEYS: &[&str] = &["evidence", "evidence_quotes", "quotes", "quote"];
const PAGE_REF_KEYS: &[&str] = &["page_refs", "pages", "page"];
const WINDOW_KEYS: &[&str] = &["suggested_window", "timeframe", "timing", "when"];
const CATEGORY_KEYS: &[&str] = &["category", "system", "area"];

/// Normalize a raw analysis payload.
///
/// Pure and deterministic. Anything other than a JSON object is rejected
/// outright; every field of an object input resolves to a legal value.
pub fn normalize(raw: &Value) -> Result<NormalizedAnalysis, NormalizeError> {
    if !raw.is_object() {
        return Err(NormalizeError::NotAnObject(kind_of(raw)));
    }

    Ok(NormalizedAnalysis {
        summary: summary(resolve(raw, Field::Summary)),
        overall_condition: resolve(raw, Field::OverallCondition)
            .value()
            .and_then(text)
            .map(|s| Condition::from_wire(&s))
            .unwrap_or_default(),
        confidence: confidence(resolve(raw, Field::Confidence).value(), DEFAULT_CONFIDENCE),
        systems_detected: list(resolve(raw, Field::SystemsDetected), detected_system, detected_system),
        systems_missing: list(resolve(raw, Field::SystemsMissing), missing_system, missing_system),
        recommended_actions: list(
            resolve(raw, Field::RecommendedActions),
            |v| action(v, TITLE_KEYS),
            |v| action(v, LEGACY_SUGGESTION_TITLE_KEYS),
        ),
        risks: list(
            resolve(raw, Field::Risks),
            |v| risk(v, TITLE_KEYS, &["severity"]),
            |v| risk(v, LEGACY_ATTENTION_TITLE_KEYS, &["severity", "urgency", "priority"]),
        ),
        citations: list(resolve(raw, Field::Citations), citation, citation),
        metadata: resolve(raw, Field::Metadata)
            .value()
            .map(metadata)
            .unwrap_or_default(),
    })
}

fn resolve(raw: &Value, field: Field) -> Resolved<'_> {
    let Some(rule) = RESOLUTION_TABLE.iter().find(|r| r.field == field) else {
        return Resolved::Missing;
    };
    if let Some(v) = rule.canonical.iter().find_map(|p| lookup(raw, p)) {
        return Resolved::Canonical(v);
    }
    if let Some(v) = rule.legacy.iter().find_map(|p| lookup(raw, p)) {
        return Resolved::Legacy(v);
    }
    Resolved::Missing
}

/// Walk a dotted path. Null counts as absent.
fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |node, key| node.as_object().and_then(|obj| get(obj, key)))
        .filter(|v| !v.is_null())
}

/// Look up `key` as written, then in camelCase.
fn get<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key)
        .or_else(|| obj.get(&camel_case(key)))
        .filter(|v| !v.is_null())
}

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| get(obj, k))
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Scalar coercions
// ============================================================================

fn text(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn text_at(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| get(obj, k).and_then(text))
}

fn summary(resolved: Resolved<'_>) -> String {
    let full = resolved.value().and_then(text).unwrap_or_default();
    let truncated: String = full.chars().take(SUMMARY_MAX_CHARS).collect();
    truncated.trim_end().to_string()
}

/// Clamp into `[0, 1]`; anything non-numeric or non-finite takes `default`.
fn confidence(v: Option<&Value>, default: f64) -> f64 {
    let parsed = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => default,
    }
}

fn page(v: &Value) -> Option<u32> {
    let parsed: Option<u32> = match v {
        Value::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|p| *p > 0)
}

fn page_refs(obj: &Map<String, Value>) -> Vec<u32> {
    match first(obj, PAGE_REF_KEYS) {
        Some(Value::Array(items)) => items.iter().filter_map(page).collect(),
        Some(single) => page(single).into_iter().collect(),
        None => Vec::new(),
    }
}

fn quotes(obj: &Map<String, Value>) -> Vec<String> {
    match first(obj, EVIDENCE_KEYS) {
        Some(Value::Array(items)) => items.iter().filter_map(text).collect(),
        Some(single) => text(single).into_iter().collect(),
        None => Vec::new(),
    }
}

// ============================================================================
// List items
// ============================================================================

fn list<T>(
    resolved: Resolved<'_>,
    canonical: impl Fn(&Value) -> Option<T>,
    legacy: impl Fn(&Value) -> Option<T>,
) -> Vec<T> {
    match resolved {
        Resolved::Canonical(Value::Array(items)) => items.iter().filter_map(canonical).collect(),
        Resolved::Legacy(Value::Array(items)) => items.iter().filter_map(legacy).collect(),
        _ => Vec::new(),
    }
}

fn detected_system(v: &Value) -> Option<DetectedSystem> {
    if let Some(name) = text(v) {
        return Some(DetectedSystem {
            name,
            condition: Condition::Unknown,
            confidence: DEFAULT_SYSTEM_CONFIDENCE,
            evidence: Vec::new(),
            page_refs: Vec::new(),
        });
    }

    let obj = v.as_object()?;
    Some(DetectedSystem {
        name: text_at(obj, NAME_KEYS)?,
        condition: text_at(obj, CONDITION_KEYS)
            .map(|c| Condition::from_wire(&c))
            .unwrap_or_default(),
        confidence: confidence(get(obj, "confidence"), DEFAULT_SYSTEM_CONFIDENCE),
        evidence: quotes(obj),
        page_refs: page_refs(obj),
    })
}

fn missing_system(v: &Value) -> Option<MissingSystem> {
    if let Some(name) = text(v) {
        return Some(MissingSystem {
            name,
            reason: String::new(),
            confidence: DEFAULT_SYSTEM_CONFIDENCE,
        });
    }

    let obj = v.as_object()?;
    Some(MissingSystem {
        name: text_at(obj, NAME_KEYS)?,
        reason: text_at(obj, RATIONALE_KEYS).unwrap_or_default(),
        confidence: confidence(get(obj, "confidence"), DEFAULT_SYSTEM_CONFIDENCE),
    })
}

fn action(v: &Value, title_keys: &[&str]) -> Option<RecommendedAction> {
    if let Some(title) = text(v) {
        return Some(RecommendedAction {
            title,
            priority: Priority::default(),
            category: String::new(),
            rationale: String::new(),
            suggested_window: None,
            page_refs: Vec::new(),
        });
    }

    let obj = v.as_object()?;
    Some(RecommendedAction {
        title: text_at(obj, title_keys)?,
        priority: text_at(obj, &["priority", "urgency"])
            .map(|p| Priority::from_wire(&p))
            .unwrap_or_default(),
        category: text_at(obj, CATEGORY_KEYS).unwrap_or_default(),
        rationale: text_at(obj, RATIONALE_KEYS).unwrap_or_default(),
        suggested_window: text_at(obj, WINDOW_KEYS),
        page_refs: page_refs(obj),
    })
}

fn risk(v: &Value, title_keys: &[&str], severity_keys: &[&str]) -> Option<RiskItem> {
    if let Some(title) = text(v) {
        return Some(RiskItem {
            title,
            severity: Severity::default(),
            rationale: String::new(),
            evidence: Vec::new(),
            page_refs: Vec::new(),
        });
    }

    let obj = v.as_object()?;
    Some(RiskItem {
        title: text_at(obj, title_keys)?,
        severity: text_at(obj, severity_keys)
            .map(|s| Severity::from_wire(&s))
            .unwrap_or_default(),
        rationale: text_at(obj, RATIONALE_KEYS).unwrap_or_default(),
        evidence: quotes(obj),
        page_refs: page_refs(obj),
    })
}

fn citation(v: &Value) -> Option<Citation> {
    if let Some(quote) = text(v) {
        return Some(Citation {
            page: None,
            quote,
            section: None,
        });
    }

    let obj = v.as_object()?;
    Some(Citation {
        page: first(obj, &["page", "page_number"]).and_then(page),
        quote: text_at(obj, &["quote", "text", "excerpt"])?,
        section: text_at(obj, &["section", "heading"]),
    })
}

fn metadata(v: &Value) -> AnalysisMetadata {
    let Some(obj) = v.as_object() else {
        return AnalysisMetadata::default();
    };
    AnalysisMetadata {
        model: text_at(obj, &["model", "model_id"]),
        created_at: text_at(obj, &["created_at", "generated_at"]),
        document_id: text_at(obj, &["document_id"]),
        document_hash: text_at(obj, &["document_hash", "hash"]),
    }
}
