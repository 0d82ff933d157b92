//! Canonical analysis record
//!
//! Every payload the analysis service returns, in any of its wire shapes, is
//! reduced to a [`NormalizedAnalysis`] before it is cached or surfaced. The
//! serialized form of this record is itself the canonical wire shape, so it
//! can be fed back through the normalizer unchanged.

use serde::{Deserialize, Serialize};

/// Overall condition rating
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl Condition {
    /// Map a wire value onto the vocabulary, falling back to `Unknown`.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "excellent" => Self::Excellent,
            "good" => Self::Good,
            "fair" => Self::Fair,
            "poor" => Self::Poor,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Excellent => write!(f, "excellent"),
            Condition::Good => write!(f, "good"),
            Condition::Fair => write!(f, "fair"),
            Condition::Poor => write!(f, "poor"),
            Condition::Unknown => write!(f, "unknown"),
        }
    }
}

/// Recommended action priority
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Map a wire value onto the vocabulary, falling back to `Medium`.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "urgent" => Self::Urgent,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Urgent => write!(f, "urgent"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Risk severity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    /// Map a wire value onto the vocabulary, falling back to `Medium`.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

/// Sub-system the analysis found evidence for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedSystem {
    pub name: String,
    pub condition: Condition,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub page_refs: Vec<u32>,
}

/// Sub-system expected but not found in the source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissingSystem {
    pub name: String,
    pub reason: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedAction {
    pub title: String,
    pub priority: Priority,
    pub category: String,
    pub rationale: String,
    /// Free-form scheduling hint, e.g. "within 6 months".
    pub suggested_window: Option<String>,
    pub page_refs: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskItem {
    pub title: String,
    pub severity: Severity,
    pub rationale: String,
    pub evidence: Vec<String>,
    pub page_refs: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub page: Option<u32>,
    pub quote: String,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisMetadata {
    pub model: Option<String>,
    pub created_at: Option<String>,
    pub document_id: Option<String>,
    pub document_hash: Option<String>,
}

/// Canonical analysis output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedAnalysis {
    /// At most [`SUMMARY_MAX_CHARS`](crate::normalize::SUMMARY_MAX_CHARS) characters.
    pub summary: String,
    pub overall_condition: Condition,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub systems_detected: Vec<DetectedSystem>,
    pub systems_missing: Vec<MissingSystem>,
    pub recommended_actions: Vec<RecommendedAction>,
    pub risks: Vec<RiskItem>,
    pub citations: Vec<Citation>,
    pub metadata: AnalysisMetadata,
}
