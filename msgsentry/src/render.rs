//! Line-oriented overlay renderer
//!
//! Stands in for a real overlay surface: every marker action is emitted as
//! one JSON line on stdout, where the host process (or a human) can watch
//! what the core decided to show.

use msgsentry_core::{ClassificationVerdict, OverlayRenderer, ScreenRect};
use serde_json::json;

pub struct LogRenderer;

fn emit(value: serde_json::Value) -> msgsentry_core::Result<()> {
    println!("{}", value);
    Ok(())
}

impl OverlayRenderer for LogRenderer {
    fn render_marker(&self, key: &str, rect: ScreenRect) -> msgsentry_core::Result<()> {
        emit(json!({"event": "marker_placed", "key": key, "rect": rect}))
    }

    fn move_marker(&self, key: &str, rect: ScreenRect) -> msgsentry_core::Result<()> {
        emit(json!({"event": "marker_moved", "key": key, "rect": rect}))
    }

    fn remove_marker(&self, key: &str) -> msgsentry_core::Result<()> {
        emit(json!({"event": "marker_removed", "key": key}))
    }

    fn open_popup(&self, key: &str, verdict: &ClassificationVerdict) -> msgsentry_core::Result<()> {
        emit(json!({
            "event": "popup_opened",
            "key": key,
            "label": verdict.label,
            "confidence": verdict.confidence,
            "explanation": verdict.explanation,
            "sources": verdict.sources,
        }))
    }

    fn close_popup(&self, key: &str) -> msgsentry_core::Result<()> {
        emit(json!({"event": "popup_closed", "key": key}))
    }
}
