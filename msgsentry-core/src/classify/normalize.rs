//! Backend response normalization
//!
//! Backends are supposed to answer with a bare JSON object, but they wrap
//! it in prose often enough that we extract the first well-formed object
//! substring (first `{` to last `}`) before parsing. The parse is strict:
//! unknown fields, missing required fields, or an out-of-range confidence
//! all fail normalization, which the racer treats exactly like a network
//! failure.

use serde::Deserialize;

use crate::types::{ClassificationVerdict, Severity};

/// Raw wire shape of a backend verdict.
///
/// Extra or renamed fields are malformed by contract, hence
/// `deny_unknown_fields`. `severity` and `isHumor` default the way the
/// response schema documents them.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireVerdict {
    #[serde(rename = "isMisinformation")]
    is_misinformation: bool,
    confidence: f64,
    label: String,
    explanation: String,
    sources: Vec<String>,
    #[serde(default = "default_severity")]
    severity: String,
    #[serde(rename = "isHumor", default)]
    #[allow(dead_code)] // Present in the wire contract; flagged content is never excused as humor
    is_humor: bool,
}

fn default_severity() -> String {
    "NONE".to_string()
}

/// Extract the first JSON object substring from a raw text response.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse and normalize a raw backend response.
///
/// Returns None when no JSON object is found, a field fails to parse, or
/// confidence is out of range. The severity invariant is enforced here:
/// a flagged verdict always comes out `High`, an unflagged one `None`.
pub fn normalize_response(raw: &str) -> Option<ClassificationVerdict> {
    let json = extract_json_object(raw)?;
    let wire: WireVerdict = match serde_json::from_str(json) {
        Ok(wire) => wire,
        Err(err) => {
            tracing::debug!(error = %err, "malformed backend verdict");
            return None;
        }
    };

    if !(0.0..=1.0).contains(&wire.confidence) {
        tracing::debug!(confidence = wire.confidence, "confidence out of range");
        return None;
    }

    let severity = Severity::normalized(&wire.severity, wire.is_misinformation);

    Some(ClassificationVerdict {
        is_flagged: wire.is_misinformation,
        confidence: wire.confidence,
        label: wire.label,
        explanation: wire.explanation,
        sources: wire.sources,
        severity,
        is_humor: false,
    })
}
