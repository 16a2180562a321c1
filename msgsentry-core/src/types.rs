//! Core domain types for msgsentry
//!
//! These types represent the data that flows through the detection core:
//! observations coming in from the UI-inspection collaborator, verdicts
//! coming back from classification, and the records the bounded stores keep.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Observation** | One `(text, rect, context)` sample from the UI tree |
//! | **Verdict** | The normalized result of classifying a text |
//! | **Flagged entry** | A text whose verdict was positive with HIGH severity |
//! | **Context** | The active chat/conversation; scopes markers and dismissals |
//! | **Marker** | The visual indicator anchored to a flagged message on screen |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Classification
// ============================================

/// Severity of a classification verdict.
///
/// Only two values exist by contract: a flagged message is always `High`
/// (only HIGH severity ever produces a visible marker) and everything else
/// is `None`. Backends reporting any other value are coerced during
/// normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    None,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::High => "HIGH",
        }
    }

    /// Apply the severity invariant to a raw backend severity string.
    ///
    /// Anything outside {HIGH, NONE} collapses to `None`; an unflagged
    /// verdict is forced to `None`; a flagged verdict is forced to `High`.
    pub fn normalized(raw: &str, is_flagged: bool) -> Severity {
        let severity = match raw.to_uppercase().as_str() {
            "HIGH" => Severity::High,
            _ => Severity::None,
        };
        if !is_flagged {
            Severity::None
        } else if severity == Severity::None {
            Severity::High
        } else {
            severity
        }
    }
}

/// Normalized classification verdict.
///
/// Produced by the remote classification racer or synthesized directly by
/// the local heuristics (phishing hits are always `High`/flagged).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    /// Whether the text was classified as misinformation/phishing
    pub is_flagged: bool,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// Classification label (e.g. "FALSE", "SCAM", "PHISHING", "TRUE")
    pub label: String,
    /// Brief explanation of the verdict
    pub explanation: String,
    /// Sources backing the verdict
    pub sources: Vec<String>,
    /// Severity; `High` if and only if `is_flagged`
    pub severity: Severity,
    /// Whether the backend judged the text to be humor
    pub is_humor: bool,
}

impl ClassificationVerdict {
    /// True when this verdict should surface a visible marker.
    pub fn needs_marker(&self) -> bool {
        self.is_flagged && self.severity == Severity::High
    }
}

/// A flagged message as stored in the flagged-message store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedEntry {
    /// Raw observed message text (the join key against live observations)
    pub key: String,
    /// The verdict that flagged it
    pub verdict: ClassificationVerdict,
    /// When the entry was (last) flagged
    pub created_at: DateTime<Utc>,
}

// ============================================
// Observations
// ============================================

/// Screen rectangle of an observed text node, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Bounds reported by the UI tree are occasionally garbage while views
    /// are being laid out; reject those before anchoring a marker to them.
    pub fn is_valid(&self) -> bool {
        self.left >= 0 && self.top >= 0 && self.width > 0 && self.height > 0
    }
}

/// One sample from the UI-observation feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Raw text of the observed node
    pub text: String,
    /// Screen bounds of the node
    pub rect: ScreenRect,
    /// Identity of the chat/conversation the node belongs to
    pub context_id: String,
}

/// One sample from the platform notification feed.
///
/// Notifications carry no screen rectangle, so they only feed
/// classification and never marker placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Notification body text
    pub text: String,
    /// Package/app identifier the notification came from
    pub app_id: String,
}

// ============================================
// Local heuristics
// ============================================

/// Risk level assigned to a URL by the local scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Unknown,
}

/// Result of the local URL risk assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRisk {
    pub is_phishing: bool,
    pub risk_level: RiskLevel,
    /// min(score / 100, 0.95)
    pub confidence: f64,
    /// Human-readable reasons for each triggered check
    pub reasons: Vec<String>,
}

/// Result of the pixel-statistics image analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFinding {
    pub detected: bool,
    /// Detection method that fired ("Metadata", "Chi-Square", "LSB Analysis")
    pub method: String,
    pub details: String,
}

impl ImageFinding {
    pub fn negative() -> Self {
        Self {
            detected: false,
            method: String::new(),
            details: String::new(),
        }
    }

    pub fn positive(method: &str, details: impl Into<String>) -> Self {
        Self {
            detected: true,
            method: method.to_string(),
            details: details.into(),
        }
    }
}

// ============================================
// Session status
// ============================================

/// Snapshot exposed to the persistent status-indicator collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Whether monitoring is currently active
    pub active: bool,
    /// Number of flagged messages currently stored
    pub flagged: usize,
    /// Number of completed classifications (any verdict)
    pub processed: usize,
}
