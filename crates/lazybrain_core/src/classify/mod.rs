//! Classification boundary and confidence gate.
//!
//! # Responsibility
//! - Define the typed contract around the external natural-language
//!   service: classification of new captures and intent detection for
//!   mutations.
//! - Coerce the service's untrusted JSON into typed results at this
//!   boundary; untyped data never propagates inward.
//! - Decide auto-route vs. review from confidence (the gate).
//!
//! # Invariants
//! - A forced category prefix yields confidence 1.0 deterministically.
//! - Any transport or parse failure surfaces as `ClassifyError`; callers
//!   fall back to the needs-review path so no message is lost.

use crate::model::item::{Category, ItemStatus};
use chrono::NaiveDate;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod openai;

pub use openai::{OpenAiClassifier, OpenAiConfig};

/// Label used on audit records for unroutable captures.
pub const NEEDS_REVIEW_LABEL: &str = "needs_review";

/// Outcome bucket of a classification: a concrete category or the review
/// queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedCategory {
    Bucket(Category),
    NeedsReview,
}

impl ClassifiedCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Bucket(category) => category.as_str(),
            Self::NeedsReview => NEEDS_REVIEW_LABEL,
        }
    }
}

/// Typed classification of one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: ClassifiedCategory,
    /// Confidence in `[0, 1]`, clamped at the boundary.
    pub confidence: f64,
    pub title: String,
    pub summary: Option<String>,
    pub next_action: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub follow_up_reason: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

impl Classification {
    /// Fallback classification for a failed external call: parked in the
    /// review queue with zero confidence, title derived from the text.
    pub fn unavailable_fallback(text: &str) -> Self {
        Self {
            category: ClassifiedCategory::NeedsReview,
            confidence: 0.0,
            title: derive_title(text),
            summary: Some(text.to_string()),
            next_action: None,
            due_date: None,
            follow_up_reason: None,
            follow_up_date: None,
        }
    }

    /// Coerces an externally-versioned JSON payload into a typed
    /// classification.
    ///
    /// # Errors
    /// - Missing or non-string `category`/`title`.
    /// - Category label outside the known vocabulary.
    pub fn from_json(value: &Value) -> Result<Self, ClassifyError> {
        let category_label = require_str(value, "category")?;
        let category = if category_label.eq_ignore_ascii_case(NEEDS_REVIEW_LABEL) {
            ClassifiedCategory::NeedsReview
        } else {
            Category::parse_label(category_label)
                .map(ClassifiedCategory::Bucket)
                .ok_or_else(|| ClassifyError::InvalidPayload {
                    message: format!("unknown category label `{category_label}`"),
                })?
        };

        let confidence = value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Ok(Self {
            category,
            confidence,
            title: require_str(value, "title")?.to_string(),
            summary: optional_str(value, "summary"),
            next_action: optional_str(value, "next_action"),
            due_date: optional_date(value, "due_date"),
            follow_up_reason: optional_str(value, "follow_up"),
            follow_up_date: optional_date(value, "follow_up_date"),
        })
    }
}

/// Detected mutation intent for an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Completion {
        target: String,
        bucket_hint: Option<Category>,
    },
    Deletion {
        target: String,
        bucket_hint: Option<Category>,
    },
    StatusChange {
        target: String,
        new_status: ItemStatus,
        bucket_hint: Option<Category>,
    },
    None,
}

impl Intent {
    /// Coerces an intent payload
    /// (`{"intent": "...", "target": "...", ...}`) into a typed variant.
    /// Unknown or incomplete payloads degrade to `Intent::None` so the
    /// message falls through to standard capture.
    pub fn from_json(value: &Value) -> Self {
        let kind = value.get("intent").and_then(Value::as_str).unwrap_or("none");
        let target = optional_str(value, "target");
        let bucket_hint = value
            .get("bucket")
            .and_then(Value::as_str)
            .and_then(Category::parse_label);

        match (kind, target) {
            ("completion", Some(target)) => Self::Completion {
                target,
                bucket_hint,
            },
            ("deletion", Some(target)) => Self::Deletion {
                target,
                bucket_hint,
            },
            ("status_change", Some(target)) => {
                let new_status = value
                    .get("new_status")
                    .and_then(Value::as_str)
                    .and_then(ItemStatus::parse);
                match new_status {
                    Some(new_status) => Self::StatusChange {
                        target,
                        new_status,
                        bucket_hint,
                    },
                    None => Self::None,
                }
            }
            _ => Self::None,
        }
    }
}

/// Boundary error for the external classification service.
#[derive(Debug)]
pub enum ClassifyError {
    /// Transport failure or timeout; the caller must fall back to the
    /// needs-review path rather than dropping the message.
    Unavailable { message: String },
    /// The service answered but the payload could not be coerced.
    InvalidPayload { message: String },
}

impl Display for ClassifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { message } => {
                write!(f, "classification service unavailable: {message}")
            }
            Self::InvalidPayload { message } => {
                write!(f, "unparseable classification payload: {message}")
            }
        }
    }
}

impl Error for ClassifyError {}

/// Boundary trait around the external natural-language service.
pub trait Classifier {
    /// Classifies raw text into a capture bucket.
    fn classify(&self, text: &str) -> Result<Classification, ClassifyError>;

    /// Detects whether raw text mutates an existing item.
    fn detect_intent(&self, text: &str) -> Result<Intent, ClassifyError>;
}

/// Routing decision produced by the confidence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Create an item in this bucket and mark the audit processed.
    Auto(Category),
    /// Park in the review queue; only the audit record remains.
    Review,
}

/// The confidence gate: `confidence >= threshold` auto-routes (inclusive
/// lower bound); anything else, or an explicit needs-review category,
/// goes to the review queue.
pub fn route_decision(threshold: f64, classification: &Classification) -> RouteDecision {
    match classification.category {
        ClassifiedCategory::Bucket(category) if classification.confidence >= threshold => {
            RouteDecision::Auto(category)
        }
        _ => RouteDecision::Review,
    }
}

/// Splits a leading forced-category marker (`task:`, `admin:`, `project:`,
/// `contact:`, `person:`, `idea:`) off the text, case-insensitively.
pub fn parse_forced_prefix(text: &str) -> Option<(Category, &str)> {
    let trimmed = text.trim_start();
    let colon = trimmed.find(':')?;
    let category = Category::parse_label(&trimmed[..colon])?;
    Some((category, trimmed[colon + 1..].trim_start()))
}

/// Derives a short title from raw text when the classifier cannot supply
/// one.
pub fn derive_title(text: &str) -> String {
    const MAX_TITLE_CHARS: usize = 80;
    let first_line = text.lines().next().unwrap_or("").trim();
    let mut title: String = first_line.chars().take(MAX_TITLE_CHARS).collect();
    if title.is_empty() {
        title.push_str("Untitled");
    }
    title
}

fn require_str<'v>(value: &'v Value, key: &str) -> Result<&'v str, ClassifyError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ClassifyError::InvalidPayload {
            message: format!("missing `{key}` field"),
        })
}

fn optional_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

fn optional_date(value: &Value, key: &str) -> Option<NaiveDate> {
    optional_str(value, key).and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::{
        parse_forced_prefix, route_decision, Classification, ClassifiedCategory, Intent,
        RouteDecision,
    };
    use crate::model::item::{Category, ItemStatus};
    use serde_json::json;

    fn classified(category: ClassifiedCategory, confidence: f64) -> Classification {
        Classification {
            category,
            confidence,
            title: "t".to_string(),
            summary: None,
            next_action: None,
            due_date: None,
            follow_up_reason: None,
            follow_up_date: None,
        }
    }

    #[test]
    fn gate_is_inclusive_at_the_threshold() {
        let c = classified(ClassifiedCategory::Bucket(Category::Task), 0.6);
        assert_eq!(route_decision(0.6, &c), RouteDecision::Auto(Category::Task));
    }

    #[test]
    fn gate_routes_below_threshold_to_review() {
        let c = classified(ClassifiedCategory::Bucket(Category::Idea), 0.59);
        assert_eq!(route_decision(0.6, &c), RouteDecision::Review);
    }

    #[test]
    fn gate_never_auto_routes_needs_review() {
        let c = classified(ClassifiedCategory::NeedsReview, 0.95);
        assert_eq!(route_decision(0.6, &c), RouteDecision::Review);
    }

    #[test]
    fn forced_prefix_parses_aliases_and_strips_marker() {
        assert_eq!(
            parse_forced_prefix("admin: renew license by March 15"),
            Some((Category::Task, "renew license by March 15"))
        );
        assert_eq!(
            parse_forced_prefix("Person: Rachel from the gym"),
            Some((Category::Contact, "Rachel from the gym"))
        );
        assert_eq!(parse_forced_prefix("just a thought"), None);
    }

    #[test]
    fn classification_coerces_known_payload() {
        let payload = json!({
            "category": "projects",
            "confidence": 0.85,
            "title": "Patio build",
            "summary": "Rebuild the patio",
            "next_action": "Get estimate",
            "due_date": "2026-03-15",
        });
        let c = Classification::from_json(&payload).unwrap();
        assert_eq!(c.category, ClassifiedCategory::Bucket(Category::Project));
        assert_eq!(c.due_date.unwrap().to_string(), "2026-03-15");
        assert_eq!(c.next_action.as_deref(), Some("Get estimate"));
    }

    #[test]
    fn classification_clamps_confidence_and_ignores_null_strings() {
        let payload = json!({
            "category": "admin",
            "confidence": 1.7,
            "title": "Renew license",
            "due_date": "null",
        });
        let c = Classification::from_json(&payload).unwrap();
        assert_eq!(c.confidence, 1.0);
        assert!(c.due_date.is_none());
    }

    #[test]
    fn classification_rejects_unknown_category() {
        let payload = json!({"category": "errands", "title": "x"});
        assert!(Classification::from_json(&payload).is_err());
    }

    #[test]
    fn intent_degrades_to_none_on_incomplete_payload() {
        assert_eq!(Intent::from_json(&json!({"intent": "completion"})), Intent::None);
        assert_eq!(
            Intent::from_json(&json!({"intent": "status_change", "target": "patio"})),
            Intent::None
        );
    }

    #[test]
    fn intent_parses_status_change_with_bucket_hint() {
        let intent = Intent::from_json(&json!({
            "intent": "status_change",
            "target": "patio build",
            "new_status": "paused",
            "bucket": "projects",
        }));
        assert_eq!(
            intent,
            Intent::StatusChange {
                target: "patio build".to_string(),
                new_status: ItemStatus::Paused,
                bucket_hint: Some(Category::Project),
            }
        );
    }
}
